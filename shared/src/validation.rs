//! Validation utilities for the Recyclable Materials Marketplace
//!
//! Includes Mexico-specific validations for addresses, phone numbers, and
//! taxpayer registry codes.

use rust_decimal::Decimal;

// ============================================================================
// Listing Validations
// ============================================================================

/// Minimum quantity a school may publish, in kg
pub const MIN_QUANTITY_KG: i64 = 50;
/// Maximum quantity a school may publish, in kg
pub const MAX_QUANTITY_KG: i64 = 2000;

/// Images required per listing
pub const MIN_IMAGES: usize = 1;
pub const MAX_IMAGES: usize = 3;
/// Maximum image size (5 MB)
pub const MAX_IMAGE_SIZE_BYTES: usize = 5 * 1024 * 1024;
/// Accepted image content types
pub const ALLOWED_IMAGE_TYPES: &[&str] =
    &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Validate listing title length (20-200 characters)
pub fn validate_title(title: &str) -> Result<(), &'static str> {
    let len = title.trim().chars().count();
    if len < 20 {
        return Err("Title must be at least 20 characters");
    }
    if len > 200 {
        return Err("Title must be at most 200 characters");
    }
    Ok(())
}

/// Validate published quantity is within the accepted range
pub fn validate_quantity(quantity_kg: Decimal) -> Result<(), &'static str> {
    if quantity_kg < Decimal::from(MIN_QUANTITY_KG) {
        return Err("Quantity must be at least 50 kg");
    }
    if quantity_kg > Decimal::from(MAX_QUANTITY_KG) {
        return Err("Quantity must be at most 2000 kg");
    }
    Ok(())
}

/// Validate geographic coordinates
pub fn validate_coordinates(latitude: Decimal, longitude: Decimal) -> Result<(), &'static str> {
    if latitude < Decimal::from(-90) || latitude > Decimal::from(90) {
        return Err("Latitude must be between -90 and 90");
    }
    if longitude < Decimal::from(-180) || longitude > Decimal::from(180) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}

/// Validate the number of images attached to a listing
pub fn validate_image_count(count: usize) -> Result<(), &'static str> {
    if count < MIN_IMAGES {
        return Err("At least one image is required");
    }
    if count > MAX_IMAGES {
        return Err("At most three images are allowed");
    }
    Ok(())
}

/// Validate an uploaded image's content type and size
pub fn validate_image_file(content_type: &str, size_bytes: usize) -> Result<(), &'static str> {
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return Err("Only JPG, JPEG, PNG or WEBP images are allowed");
    }
    if size_bytes > MAX_IMAGE_SIZE_BYTES {
        return Err("Each image must be smaller than 5 MB");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let at = match email.find('@') {
        Some(i) => i,
        None => return Err("Invalid email format"),
    };
    let domain = &email[at + 1..];
    if at == 0 || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 6 {
        return Err("Password must be at least 6 characters");
    }
    Ok(())
}

/// Validate login identifier (3-50 characters, no whitespace)
pub fn validate_identifier(identifier: &str) -> Result<(), &'static str> {
    if identifier.len() < 3 {
        return Err("Identifier must be at least 3 characters");
    }
    if identifier.len() > 50 {
        return Err("Identifier must be at most 50 characters");
    }
    if identifier.chars().any(char::is_whitespace) {
        return Err("Identifier must not contain whitespace");
    }
    Ok(())
}

// ============================================================================
// Mexico-Specific Validations
// ============================================================================

/// The 32 federal entities of Mexico
pub const MEXICAN_STATES: &[&str] = &[
    "Aguascalientes",
    "Baja California",
    "Baja California Sur",
    "Campeche",
    "Chiapas",
    "Chihuahua",
    "Ciudad de México",
    "Coahuila",
    "Colima",
    "Durango",
    "Estado de México",
    "Guanajuato",
    "Guerrero",
    "Hidalgo",
    "Jalisco",
    "Michoacán",
    "Morelos",
    "Nayarit",
    "Nuevo León",
    "Oaxaca",
    "Puebla",
    "Querétaro",
    "Quintana Roo",
    "San Luis Potosí",
    "Sinaloa",
    "Sonora",
    "Tabasco",
    "Tamaulipas",
    "Tlaxcala",
    "Veracruz",
    "Yucatán",
    "Zacatecas",
];

/// Validate a Mexican state name (case insensitive)
pub fn validate_mexican_state(state: &str) -> Result<(), &'static str> {
    let normalized = state.trim().to_lowercase();
    if MEXICAN_STATES
        .iter()
        .any(|s| s.to_lowercase() == normalized)
    {
        Ok(())
    } else {
        Err("Unknown Mexican state")
    }
}

/// Validate a Mexican postal code (exactly 5 digits)
pub fn validate_postal_code(postal_code: &str) -> Result<(), &'static str> {
    if postal_code.len() == 5 && postal_code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err("Postal code must be exactly 5 digits")
    }
}

/// Validate a Mexican phone number
/// Accepts: 5512345678, 55-1234-5678, +525512345678
pub fn validate_mexican_phone(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    // National format: 10 digits
    if digits.len() == 10 {
        return Ok(());
    }
    // International format with country code: 12 digits starting with 52
    if digits.len() == 12 && digits.starts_with("52") {
        return Ok(());
    }

    Err("Invalid Mexican phone number format")
}

/// Validate an RFC (Registro Federal de Contribuyentes)
/// 12 characters for companies, 13 for individuals: 3-4 letters,
/// 6-digit date, 3-character homoclave.
pub fn validate_rfc(rfc: &str) -> Result<(), &'static str> {
    let rfc = rfc.trim().to_uppercase();
    if !rfc.is_ascii() {
        return Err("Invalid RFC format");
    }
    if rfc.len() != 12 && rfc.len() != 13 {
        return Err("RFC must be 12 or 13 characters");
    }

    let prefix_len = rfc.len() - 9;
    let (prefix, rest) = rfc.split_at(prefix_len);
    if !prefix.chars().all(|c| c.is_ascii_alphabetic() || c == '&') {
        return Err("Invalid RFC format");
    }

    let (date, homoclave) = rest.split_at(6);
    if !date.chars().all(|c| c.is_ascii_digit()) {
        return Err("Invalid RFC date segment");
    }
    if !homoclave.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Invalid RFC homoclave");
    }

    Ok(())
}

/// Validate a CCT (Clave de Centro de Trabajo) for schools
/// 10 characters: 2-digit state code, letters, sequence.
pub fn validate_cct(cct: &str) -> Result<(), &'static str> {
    let cct = cct.trim().to_uppercase();
    if cct.len() != 10 {
        return Err("CCT must be 10 characters");
    }
    if !cct.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("CCT must be alphanumeric");
    }
    if !cct[..2].chars().all(|c| c.is_ascii_digit()) {
        return Err("CCT must start with a 2-digit state code");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Listing Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Papel de oficina limpio y seco").is_ok());
        assert!(validate_title("Corto").is_err());
        assert!(validate_title(&"x".repeat(201)).is_err());
        assert!(validate_title(&"x".repeat(200)).is_ok());
    }

    #[test]
    fn test_validate_quantity_bounds() {
        assert!(validate_quantity(Decimal::from(50)).is_ok());
        assert!(validate_quantity(Decimal::from(2000)).is_ok());
        assert!(validate_quantity(Decimal::from(49)).is_err());
        assert!(validate_quantity(Decimal::from(2001)).is_err());
        assert!(validate_quantity(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(Decimal::new(19_43, 2), Decimal::new(-99_13, 2)).is_ok());
        assert!(validate_coordinates(Decimal::from(90), Decimal::from(180)).is_ok());
        assert!(validate_coordinates(Decimal::from(91), Decimal::ZERO).is_err());
        assert!(validate_coordinates(Decimal::ZERO, Decimal::from(-181)).is_err());
    }

    #[test]
    fn test_validate_image_count() {
        assert!(validate_image_count(0).is_err());
        assert!(validate_image_count(1).is_ok());
        assert!(validate_image_count(3).is_ok());
        assert!(validate_image_count(4).is_err());
    }

    #[test]
    fn test_validate_image_file() {
        assert!(validate_image_file("image/jpeg", 1024).is_ok());
        assert!(validate_image_file("image/webp", MAX_IMAGE_SIZE_BYTES).is_ok());
        assert!(validate_image_file("image/gif", 1024).is_err());
        assert!(validate_image_file("image/png", MAX_IMAGE_SIZE_BYTES + 1).is_err());
    }

    // ========================================================================
    // General Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_email_valid() {
        assert!(validate_email("escuela@example.com").is_ok());
        assert!(validate_email("user.name@domain.com.mx").is_ok());
    }

    #[test]
    fn test_validate_email_invalid() {
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("no@domain").is_err());
        assert!(validate_email("@dominio.mx").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secreta123").is_ok());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("corta").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("esc-primaria-01").is_ok());
        assert!(validate_identifier("ab").is_err());
        assert!(validate_identifier("con espacio").is_err());
        assert!(validate_identifier(&"x".repeat(51)).is_err());
    }

    // ========================================================================
    // Mexico-Specific Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_mexican_state() {
        assert!(validate_mexican_state("Jalisco").is_ok());
        assert!(validate_mexican_state("ciudad de méxico").is_ok());
        assert!(validate_mexican_state("Texas").is_err());
    }

    #[test]
    fn test_validate_postal_code() {
        assert!(validate_postal_code("06600").is_ok());
        assert!(validate_postal_code("0660").is_err());
        assert!(validate_postal_code("066000").is_err());
        assert!(validate_postal_code("0660a").is_err());
    }

    #[test]
    fn test_validate_mexican_phone() {
        assert!(validate_mexican_phone("5512345678").is_ok());
        assert!(validate_mexican_phone("55-1234-5678").is_ok());
        assert!(validate_mexican_phone("+525512345678").is_ok());
        assert!(validate_mexican_phone("12345").is_err());
        assert!(validate_mexican_phone("123456789012345").is_err());
    }

    #[test]
    fn test_validate_rfc() {
        // Company (12 chars) and individual (13 chars)
        assert!(validate_rfc("ABC010203XY9").is_ok());
        assert!(validate_rfc("ABCD010203XY9").is_ok());
        assert!(validate_rfc("AB010203XY9").is_err()); // too short
        assert!(validate_rfc("ABC01020XY9").is_err()); // too short
        assert!(validate_rfc("123010203XY9").is_err()); // digit prefix
        assert!(validate_rfc("ABCDEFGHIXY9").is_err()); // non-digit date
    }

    #[test]
    fn test_validate_cct() {
        assert!(validate_cct("09DPR1234X").is_ok());
        assert!(validate_cct("9DPR1234X").is_err()); // wrong length
        assert!(validate_cct("XXDPR1234X").is_err()); // no state code
        assert!(validate_cct("09DPR-234X").is_err()); // special char
    }
}
