//! Built-in materials addressable by name.

use std::sync::Arc;

use crate::cauchy::CauchyMaterial;
use crate::provider::{ConstantMaterial, MaterialError, MaterialProvider};
use crate::tabulated::TabulatedMaterial;

/// Identifiers accepted by [`builtin`], with a short description.
pub const BUILTIN: &[(&str, &str)] = &[
    ("air", "Air, n = 1"),
    ("water", "Water, n = 1.333"),
    ("fused_silica", "Fused silica, Cauchy fit"),
    ("bk7", "BK7 crown glass, Cauchy fit"),
    ("tio2", "Rutile TiO₂, tabulated (Palik)"),
    ("si", "Crystalline silicon, tabulated (Green)"),
];

/// Look up a built-in material. Names are case-insensitive.
pub fn builtin(name: &str) -> Result<Arc<dyn MaterialProvider>, MaterialError> {
    let material: Arc<dyn MaterialProvider> = match name.to_ascii_lowercase().as_str() {
        "air" | "vacuum" => Arc::new(ConstantMaterial::air()),
        "water" => Arc::new(ConstantMaterial::water()),
        "fused_silica" | "sio2" => Arc::new(CauchyMaterial::fused_silica()),
        "bk7" => Arc::new(CauchyMaterial::bk7()),
        "tio2" => Arc::new(TabulatedMaterial::tio2()),
        "si" | "silicon" => Arc::new(TabulatedMaterial::silicon()),
        _ => return Err(MaterialError::NotFound(name.to_string())),
    };
    Ok(material)
}
