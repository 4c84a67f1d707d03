use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::intake::ImageAsset;

/// German energy-efficiency label set, best (A) to worst (H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EfficiencyClass {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

impl EfficiencyClass {
    pub const ALL: [EfficiencyClass; 8] = [
        EfficiencyClass::A,
        EfficiencyClass::B,
        EfficiencyClass::C,
        EfficiencyClass::D,
        EfficiencyClass::E,
        EfficiencyClass::F,
        EfficiencyClass::G,
        EfficiencyClass::H,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EfficiencyClass::A => "A",
            EfficiencyClass::B => "B",
            EfficiencyClass::C => "C",
            EfficiencyClass::D => "D",
            EfficiencyClass::E => "E",
            EfficiencyClass::F => "F",
            EfficiencyClass::G => "G",
            EfficiencyClass::H => "H",
        }
    }
}

impl fmt::Display for EfficiencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EfficiencyClass {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        EfficiencyClass::ALL
            .into_iter()
            .find(|class| class.as_str() == normalized)
            .ok_or_else(|| format!("unknown efficiency class '{raw}' (expected A-H)"))
    }
}

/// User-supplied property facts. Immutable once a plan request has been
/// issued for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub address: String,
    pub floor_area_sqm: f64,
    pub budget_eur: f64,
    pub efficiency_class: EfficiencyClass,
}

/// Precondition check for issuing a plan request. Violations are caller-side
/// errors; the request builder itself assumes valid inputs.
pub fn validate_plan_inputs(
    details: &PropertyDetails,
    images: &[ImageAsset],
) -> Result<(), ValidationError> {
    if details.address.trim().is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    if !(details.floor_area_sqm > 0.0) {
        return Err(ValidationError::NonPositiveFloorArea);
    }
    if !(details.budget_eur > 0.0) {
        return Err(ValidationError::NonPositiveBudget);
    }
    if images.is_empty() {
        return Err(ValidationError::NoImages);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_plan_inputs, EfficiencyClass, PropertyDetails};
    use crate::error::ValidationError;
    use crate::intake::ImageAsset;

    fn details() -> PropertyDetails {
        PropertyDetails {
            address: "Torstraße 45, Berlin".to_string(),
            floor_area_sqm: 500.0,
            budget_eur: 250_000.0,
            efficiency_class: EfficiencyClass::E,
        }
    }

    fn one_image() -> Vec<ImageAsset> {
        vec![ImageAsset::from_bytes("image/jpeg", b"jpeg-bytes")]
    }

    #[test]
    fn efficiency_class_round_trips_through_text() {
        for class in EfficiencyClass::ALL {
            let parsed: EfficiencyClass = class.as_str().parse().unwrap();
            assert_eq!(parsed, class);
        }
        assert_eq!(" e ".parse::<EfficiencyClass>(), Ok(EfficiencyClass::E));
        assert!("K".parse::<EfficiencyClass>().is_err());
    }

    #[test]
    fn efficiency_class_ordering_matches_label_order() {
        assert!(EfficiencyClass::A < EfficiencyClass::B);
        assert!(EfficiencyClass::E < EfficiencyClass::H);
    }

    #[test]
    fn efficiency_class_serializes_as_single_letter() {
        let encoded = serde_json::to_string(&EfficiencyClass::E).unwrap();
        assert_eq!(encoded, "\"E\"");
    }

    #[test]
    fn valid_inputs_pass() {
        assert_eq!(validate_plan_inputs(&details(), &one_image()), Ok(()));
    }

    #[test]
    fn blank_address_is_rejected() {
        let mut bad = details();
        bad.address = "   ".to_string();
        assert_eq!(
            validate_plan_inputs(&bad, &one_image()),
            Err(ValidationError::EmptyAddress)
        );
    }

    #[test]
    fn missing_images_are_rejected() {
        assert_eq!(
            validate_plan_inputs(&details(), &[]),
            Err(ValidationError::NoImages)
        );
    }

    #[test]
    fn non_positive_metrics_are_rejected() {
        let mut bad = details();
        bad.floor_area_sqm = 0.0;
        assert_eq!(
            validate_plan_inputs(&bad, &one_image()),
            Err(ValidationError::NonPositiveFloorArea)
        );

        let mut bad = details();
        bad.budget_eur = -1.0;
        assert_eq!(
            validate_plan_inputs(&bad, &one_image()),
            Err(ValidationError::NonPositiveBudget)
        );

        let mut bad = details();
        bad.floor_area_sqm = f64::NAN;
        assert_eq!(
            validate_plan_inputs(&bad, &one_image()),
            Err(ValidationError::NonPositiveFloorArea)
        );
    }
}
