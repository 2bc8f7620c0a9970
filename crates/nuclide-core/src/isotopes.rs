//! Built-in half-life table for common nuclear-medicine isotopes.

use crate::types::Isotope;

/// `(name, half-life in hours)`.
pub const CATALOGUE: &[(&str, f64)] = &[
    ("Tc-99m", 6.0067),
    ("F-18", 1.8295),
    ("Ga-68", 1.1285),
    ("I-123", 13.2235),
    ("I-131", 192.5),
    ("In-111", 67.31),
    ("Tl-201", 72.91),
    ("Lu-177", 159.53),
    ("Mo-99", 65.94),
    ("Y-90", 64.05),
];

/// Look up an isotope by name, ignoring case.
///
/// # Examples
///
/// ```
/// use nuclide_core::isotopes;
/// let tc = isotopes::lookup("tc-99m").unwrap();
/// assert_eq!(tc.name, "Tc-99m");
/// assert!(isotopes::lookup("Xx-1").is_none());
/// ```
pub fn lookup(name: &str) -> Option<Isotope> {
    CATALOGUE
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
        .map(|(n, h)| Isotope::new(*n, *h))
}

/// Every catalogued isotope, in table order.
pub fn all() -> Vec<Isotope> {
    CATALOGUE.iter().map(|(n, h)| Isotope::new(*n, *h)).collect()
}
