pub mod validation;

pub use validation::{MAX_NAME_LENGTH, names_match, split_submission, validate_name};

/// Unicode-aware case-insensitive substring test. An empty needle matches.
pub fn contains_case_insensitive(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let haystack_folded = unicase::UniCase::new(haystack).to_folded_case();
    let needle_folded = unicase::UniCase::new(needle).to_folded_case();
    haystack_folded.contains(&needle_folded)
}

/// Generate a client-side document id.
pub fn generate_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
