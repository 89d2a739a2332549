//! # Filmstack Materials
//!
//! Refractive-index providers for thin-film stacks. All materials implement
//! the [`MaterialProvider`](provider::MaterialProvider) trait, which returns
//! the complex index $N = n - ik$ at a given vacuum wavelength.
//!
//! ## Available sources
//!
//! | Source | Module | Notes |
//! |--------|--------|-------|
//! | Fixed index | [`provider::ConstantMaterial`] | Air, water, user `n, k` |
//! | Cauchy fit | [`cauchy`] | Fused silica, BK7 |
//! | Tabulated $(n, k)$ | [`tabulated`] | TiO₂, Si, CSV files |
//! | Two-phase mixture | [`mixture`] | Bruggeman EMA of two providers |
//!
//! ## Mixing
//!
//! The Bruggeman effective-medium approximation itself lives in [`ema`] and
//! works on plain complex scalars and arrays.

pub mod catalog;
pub mod cauchy;
pub mod ema;
pub mod mixture;
pub mod provider;
pub mod spline;
pub mod tabulated;
