//! Waiver models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A waiver a family has or has not yet signed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaiverRequirement {
    pub waiver_id: Uuid,
    pub version: i32,
    pub is_required: bool,
}

/// Required waivers whose current version the family has not signed.
///
/// `signed` holds `(waiver_id, version)` pairs from the family's signatures;
/// a signature on an older version does not satisfy a newer one.
pub fn outstanding_waivers(
    waivers: &[WaiverRequirement],
    signed: &[(Uuid, i32)],
) -> Vec<Uuid> {
    waivers
        .iter()
        .filter(|w| w.is_required)
        .filter(|w| !signed.iter().any(|(id, v)| *id == w.waiver_id && *v == w.version))
        .map(|w| w.waiver_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outstanding_waivers() {
        let liability = Uuid::new_v4();
        let photo = Uuid::new_v4();
        let optional = Uuid::new_v4();
        let waivers = vec![
            WaiverRequirement { waiver_id: liability, version: 2, is_required: true },
            WaiverRequirement { waiver_id: photo, version: 1, is_required: true },
            WaiverRequirement { waiver_id: optional, version: 1, is_required: false },
        ];

        // Signed the old liability version and the photo release
        let signed = vec![(liability, 1), (photo, 1)];
        assert_eq!(outstanding_waivers(&waivers, &signed), vec![liability]);

        let signed = vec![(liability, 2), (photo, 1)];
        assert!(outstanding_waivers(&waivers, &signed).is_empty());
    }
}
