//! Membership resolver.
//!
//! Turns a group's member uid list into display profiles. Profiles are read
//! once per member-list change rather than subscribed to individually.

use std::time::Duration;

use futures::future::join_all;

use crate::config::AvatarConfig;
use crate::remote::{RemoteStore, paths, with_timeout};
use crate::sync::decode_user;
use crate::types::{MemberProfile, Uid, UserProfile};

/// Shown when an item carries no author.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Resolve every uid to a display profile, preserving input order.
///
/// Reads run concurrently. A profile that is missing, malformed, or whose
/// read fails falls back to one seeded from the uid alone.
pub async fn resolve_members(
    store: &dyn RemoteStore,
    uids: &[Uid],
    avatar: &AvatarConfig,
    timeout: Duration,
) -> Vec<MemberProfile> {
    let reads = uids.iter().map(|uid| async move {
        let path = paths::user(uid);
        match with_timeout(timeout, store.get_document(&path)).await {
            Ok(Some(doc)) => decode_user(&doc),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("failed to read profile for member {uid}: {e}");
                None
            }
        }
    });
    let profiles = join_all(reads).await;

    uids.iter()
        .zip(profiles)
        .map(|(uid, profile)| match profile {
            Some(profile) => member_from_profile(uid, profile, avatar),
            None => fallback_member(uid, avatar),
        })
        .collect()
}

fn member_from_profile(uid: &str, profile: UserProfile, avatar: &AvatarConfig) -> MemberProfile {
    MemberProfile {
        uid: uid.to_string(),
        email: profile.email,
        name: profile.name,
        avatar_color: profile
            .avatar_color
            .unwrap_or_else(|| avatar_color(uid, avatar)),
    }
}

/// Profile for a member who never registered.
pub fn fallback_member(uid: &str, avatar: &AvatarConfig) -> MemberProfile {
    MemberProfile {
        uid: uid.to_string(),
        email: None,
        name: Some(uid.to_string()),
        avatar_color: avatar_color(uid, avatar),
    }
}

/// Hue in `[0, 360)` derived from `seed`.
///
/// The hash runs over UTF-16 code units: `hash = unit + ((hash << 5) - hash)`,
/// where the shift operates on the low 32 bits of the running value.
pub fn avatar_hue(seed: &str) -> u32 {
    let mut hash: i64 = 0;
    for unit in seed.encode_utf16() {
        let shifted = i64::from((hash as i32).wrapping_shl(5));
        hash = i64::from(unit).wrapping_add(shifted.wrapping_sub(hash));
    }
    (hash.unsigned_abs() % 360) as u32
}

pub fn avatar_color(seed: &str, avatar: &AvatarConfig) -> String {
    format!(
        "hsl({}deg {}% {}%)",
        avatar_hue(seed),
        avatar.saturation,
        avatar.lightness
    )
}

/// Name to show for the author of an item.
///
/// `"Unknown"` without a uid, the raw uid for someone outside the group,
/// otherwise the member's display name.
pub fn display_name_for(uid: Option<&str>, members: &[MemberProfile]) -> String {
    let Some(uid) = uid.filter(|u| !u.is_empty()) else {
        return UNKNOWN_AUTHOR.to_string();
    };
    members
        .iter()
        .find(|m| m.uid == uid)
        .map(|m| m.display_name().to_string())
        .unwrap_or_else(|| uid.to_string())
}

/// One or two uppercase initials from a name or email; `"?"` if there are none.
pub fn initials_of(text: Option<&str>) -> String {
    let parts: Vec<&str> = text
        .unwrap_or_default()
        .split(|c: char| c.is_whitespace() || c == '@' || c == '.')
        .filter(|p| !p.is_empty())
        .collect();

    let first_upper = |s: &str| -> String {
        s.chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    };

    match parts.as_slice() {
        [] => "?".to_string(),
        [only] => first_upper(only),
        [first, second, ..] => format!("{}{}", first_upper(first), first_upper(second)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use serde_json::json;

    fn member(uid: &str, name: Option<&str>, email: Option<&str>) -> MemberProfile {
        MemberProfile {
            uid: uid.to_string(),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
            avatar_color: String::new(),
        }
    }

    #[test]
    fn test_avatar_hue_known_values() {
        assert_eq!(avatar_hue(""), 0);
        assert_eq!(avatar_hue("a"), 97);
        // 98 + (97 << 5) - 97 = 3105
        assert_eq!(avatar_hue("ab"), 225);
    }

    #[test]
    fn test_avatar_color_is_deterministic() {
        let cfg = AvatarConfig::default();
        let uid = "f3JkQ9xLmZ0aP2sTuVwXyZ12";
        assert_eq!(avatar_color(uid, &cfg), avatar_color(uid, &cfg));
        assert!(avatar_hue(uid) < 360);
        assert_eq!(avatar_color("a", &cfg), "hsl(97deg 60% 70%)");
    }

    #[test]
    fn test_avatar_hue_handles_long_seeds() {
        let seed = "z".repeat(10_000);
        assert!(avatar_hue(&seed) < 360);
    }

    #[test]
    fn test_display_name_for() {
        let members = vec![
            member("u1", Some("Ann"), Some("ann@example.com")),
            member("u2", None, Some("bob@example.com")),
            member("u3", None, None),
        ];
        assert_eq!(display_name_for(None, &members), "Unknown");
        assert_eq!(display_name_for(Some("u1"), &members), "Ann");
        assert_eq!(display_name_for(Some("u2"), &members), "bob@example.com");
        assert_eq!(display_name_for(Some("u3"), &members), "u3");
        assert_eq!(display_name_for(Some("stranger"), &members), "stranger");
    }

    #[test]
    fn test_initials_of() {
        assert_eq!(initials_of(None), "?");
        assert_eq!(initials_of(Some("  ")), "?");
        assert_eq!(initials_of(Some("ann")), "A");
        assert_eq!(initials_of(Some("ann lee")), "AL");
        assert_eq!(initials_of(Some("bob@example.com")), "BE");
        assert_eq!(initials_of(Some("j.r.r tolkien")), "JR");
    }

    #[tokio::test]
    async fn test_resolve_members_preserves_order_and_falls_back() {
        let store = MemoryStore::new();
        store
            .put_document(
                &paths::user("u2"),
                json!({"email": "bob@example.com", "name": "Bob", "groupId": "g1"}),
            )
            .unwrap();
        store
            .put_document(
                &paths::user("u3"),
                json!({"email": "cy@example.com", "avatarColor": "hsl(1deg 2% 3%)"}),
            )
            .unwrap();
        let cfg = AvatarConfig::default();
        let uids = vec!["u1".to_string(), "u2".to_string(), "u3".to_string()];

        let members = resolve_members(&store, &uids, &cfg, Duration::from_secs(5)).await;

        let order: Vec<_> = members.iter().map(|m| m.uid.as_str()).collect();
        assert_eq!(order, vec!["u1", "u2", "u3"]);
        assert_eq!(members[0].name.as_deref(), Some("u1"));
        assert_eq!(members[0].avatar_color, avatar_color("u1", &cfg));
        assert_eq!(members[1].display_name(), "Bob");
        assert_eq!(members[2].avatar_color, "hsl(1deg 2% 3%)");
    }

    #[tokio::test]
    async fn test_resolve_members_survives_read_failures() {
        let store = MemoryStore::new();
        store
            .put_document(&paths::user("u1"), json!({"name": "Ann"}))
            .unwrap();
        store.fail_next_reads(1);
        let members = resolve_members(
            &store,
            &["u1".to_string()],
            &AvatarConfig::default(),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name.as_deref(), Some("u1"));
    }
}
