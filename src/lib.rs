//! Turns photographed handwritten delivery notes (remitos) into lines for
//! the stock-movement form.
//!
//! The vision model reads the note; [`notes::apply_business_rules`] then maps
//! every product onto the form's dropdown options and adds the accessories
//! and consumables the note implies; [`form_plan`] lays the result out field
//! by field for whatever drives the browser.

pub mod config;
pub mod error;
pub mod form_plan;
pub mod llm_extract;
pub mod notes;
pub mod pipeline;
