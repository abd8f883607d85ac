//! Material listing validation tests
//!
//! Property-based and unit tests for:
//! - Listing field bounds (title, quantity, postal code, coordinates)
//! - Image count and file constraints
//! - Material type pricing and status transitions

use proptest::prelude::*;
use rust_decimal::Decimal;

use shared::{
    validate_coordinates, validate_image_count, validate_image_file, validate_mexican_state,
    validate_postal_code, validate_quantity, validate_title, MaterialStatus, MaterialType,
    ALLOWED_IMAGE_TYPES, MAX_IMAGE_SIZE_BYTES, MEXICAN_STATES,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Generate valid listing titles (20-200 characters, no edge whitespace)
fn title_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z ]{18,198}[A-Za-z]"
}

/// Generate valid quantities (50-2000 kg)
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (50i64..=2000).prop_map(Decimal::from)
}

/// Generate valid Mexican postal codes
fn postal_code_strategy() -> impl Strategy<Value = String> {
    "[0-9]{5}"
}

/// Generate valid Mexican state names
fn state_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(MEXICAN_STATES).prop_map(|s| s.to_string())
}

/// Generate coordinates inside Mexico's bounding box
fn coordinates_strategy() -> impl Strategy<Value = (Decimal, Decimal)> {
    ((14i64..=33), (-118i64..=-86))
        .prop_map(|(lat, lon)| (Decimal::from(lat), Decimal::from(lon)))
}

/// Generate one of the supported material types
fn material_type_strategy() -> impl Strategy<Value = MaterialType> {
    prop::sample::select(&MaterialType::ALL[..])
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Every generated title passes validation
    #[test]
    fn test_valid_titles_accepted(title in title_strategy()) {
        prop_assert!(validate_title(&title).is_ok());
    }

    /// Titles under 20 characters are always rejected
    #[test]
    fn test_short_titles_rejected(title in "[A-Za-z]{0,19}") {
        prop_assert!(validate_title(&title).is_err());
    }

    /// Every quantity in range is accepted
    #[test]
    fn test_valid_quantities_accepted(quantity in quantity_strategy()) {
        prop_assert!(validate_quantity(quantity).is_ok());
    }

    /// Quantities outside 50-2000 kg are rejected from both sides
    #[test]
    fn test_out_of_range_quantities_rejected(below in 0i64..50, above in 2001i64..10000) {
        prop_assert!(validate_quantity(Decimal::from(below)).is_err());
        prop_assert!(validate_quantity(Decimal::from(above)).is_err());
    }

    /// Every generated postal code is accepted
    #[test]
    fn test_valid_postal_codes_accepted(postal_code in postal_code_strategy()) {
        prop_assert!(validate_postal_code(&postal_code).is_ok());
    }

    /// Postal codes of the wrong length are rejected
    #[test]
    fn test_wrong_length_postal_codes_rejected(postal_code in "[0-9]{1,4}|[0-9]{6,8}") {
        prop_assert!(validate_postal_code(&postal_code).is_err());
    }

    /// Every federal entity passes state validation, in any casing
    #[test]
    fn test_valid_states_accepted(state in state_strategy()) {
        prop_assert!(validate_mexican_state(&state).is_ok());
        prop_assert!(validate_mexican_state(&state.to_uppercase()).is_ok());
        prop_assert!(validate_mexican_state(&state.to_lowercase()).is_ok());
    }

    /// Coordinates inside Mexico are always valid
    #[test]
    fn test_mexican_coordinates_accepted((lat, lon) in coordinates_strategy()) {
        prop_assert!(validate_coordinates(lat, lon).is_ok());
    }

    /// Unit prices are positive for every material type
    #[test]
    fn test_unit_prices_positive(material_type in material_type_strategy()) {
        prop_assert!(material_type.unit_price_mxn() > Decimal::ZERO);
    }

    /// Material types round-trip through their storage representation
    #[test]
    fn test_material_type_round_trip(material_type in material_type_strategy()) {
        let stored = material_type.as_str();
        prop_assert_eq!(MaterialType::from_str(stored), Some(material_type));
    }
}

// ============================================================================
// Image Constraint Tests
// ============================================================================

#[test]
fn test_image_count_bounds() {
    assert!(validate_image_count(0).is_err());
    for count in 1..=3 {
        assert!(validate_image_count(count).is_ok());
    }
    assert!(validate_image_count(4).is_err());
}

#[test]
fn test_allowed_image_types() {
    for content_type in ALLOWED_IMAGE_TYPES {
        assert!(validate_image_file(content_type, 1024).is_ok());
    }
    assert!(validate_image_file("image/gif", 1024).is_err());
    assert!(validate_image_file("video/mp4", 1024).is_err());
    assert!(validate_image_file("application/pdf", 1024).is_err());
}

#[test]
fn test_image_size_limit() {
    assert!(validate_image_file("image/jpeg", MAX_IMAGE_SIZE_BYTES).is_ok());
    assert!(validate_image_file("image/jpeg", MAX_IMAGE_SIZE_BYTES + 1).is_err());
}

// ============================================================================
// Status Transition Tests
// ============================================================================

#[test]
fn test_material_status_transitions() {
    use MaterialStatus::*;

    // The only legal moves
    assert!(Available.can_transition_to(Reserved));
    assert!(Reserved.can_transition_to(Purchased));
    assert!(Reserved.can_transition_to(Available));

    // Everything else is frozen
    assert!(!Available.can_transition_to(Purchased));
    assert!(!Available.can_transition_to(Available));
    assert!(!Purchased.can_transition_to(Available));
    assert!(!Purchased.can_transition_to(Reserved));
    assert!(!Reserved.can_transition_to(Reserved));
}

#[test]
fn test_material_pricing_table() {
    assert_eq!(MaterialType::Plastico.unit_price_mxn(), Decimal::new(200, 2));
    assert_eq!(MaterialType::Papel.unit_price_mxn(), Decimal::new(150, 2));
    assert_eq!(MaterialType::Vidrio.unit_price_mxn(), Decimal::new(150, 2));
    assert_eq!(MaterialType::MetalCobre.unit_price_mxn(), Decimal::new(1000, 2));
    assert_eq!(MaterialType::Organico.unit_price_mxn(), Decimal::new(200, 2));
    assert_eq!(MaterialType::Electronicos.unit_price_mxn(), Decimal::new(250, 2));
}
