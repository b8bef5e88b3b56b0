//! Message targeting and recipient tests

use std::collections::HashSet;

use proptest::prelude::*;
use shared::models::{dedupe_recipients, DeliveryChannel, MessageTarget, Recipient};
use uuid::Uuid;

fn recipient(family_id: Uuid, n: usize) -> Recipient {
    Recipient {
        family_id,
        family_name: format!("Family {}", n),
        email: Some(format!("family{}@example.com", n)),
        phone: None,
    }
}

proptest! {
    /// One recipient per family, first occurrence kept, order preserved
    #[test]
    fn prop_dedupe_one_per_family(picks in proptest::collection::vec(0usize..8, 0..40)) {
        let families: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        let input: Vec<Recipient> = picks
            .iter()
            .enumerate()
            .map(|(n, i)| recipient(families[*i], n))
            .collect();

        let output = dedupe_recipients(input.clone());

        let distinct: HashSet<Uuid> = input.iter().map(|r| r.family_id).collect();
        prop_assert_eq!(output.len(), distinct.len());

        let mut seen = HashSet::new();
        for r in &output {
            prop_assert!(seen.insert(r.family_id));
            let first = input.iter().find(|x| x.family_id == r.family_id).unwrap();
            prop_assert_eq!(r, first);
        }
    }

    #[test]
    fn prop_class_target_dedupes_ids(picks in proptest::collection::vec(0usize..5, 1..20)) {
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let target = MessageTarget::Classes(picks.iter().map(|i| ids[*i]).collect());
        match target.normalized().unwrap() {
            MessageTarget::Classes(out) => {
                let distinct: HashSet<Uuid> = out.iter().copied().collect();
                prop_assert_eq!(distinct.len(), out.len());
            }
            other => prop_assert!(false, "unexpected target {:?}", other),
        }
    }
}

#[test]
fn test_reachability_by_channel() {
    let mut r = recipient(Uuid::new_v4(), 1);
    assert!(r.is_reachable(DeliveryChannel::Email));
    assert!(!r.is_reachable(DeliveryChannel::Sms));
    r.phone = Some("+15551234567".into());
    assert!(r.is_reachable(DeliveryChannel::Sms));
    r.email = Some("  ".into());
    assert!(!r.is_reachable(DeliveryChannel::Email));
}

#[test]
fn test_target_wire_format() {
    let target: MessageTarget = serde_json::from_str(r#"{"type":"level","values":["Beginner"]}"#).unwrap();
    assert_eq!(target.normalized().unwrap(), MessageTarget::Levels(vec!["beginner".into()]));
    let everyone: MessageTarget = serde_json::from_str(r#"{"type":"everyone"}"#).unwrap();
    assert_eq!(everyone, MessageTarget::Everyone);
}
