//! The stock-movement form as a list of field entries.
//!
//! Browser automation lives outside this crate. What it gets from us is an
//! ordered plan: which labelled field to touch, in which order, with which
//! value. Field labels match the form exactly.

use crate::config::FormSection;
use crate::notes::{Item, ParsedNote};
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Date;

pub const DEFAULT_COMENTARIOS: &str = "Generado automáticamente desde remito";

/// Dropdowns are searched by typing; only this many characters are typed.
const SEARCH_CHARS: usize = 30;

/// What the caller wants entered on the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFillRequest {
    pub items: Vec<Item>,
    /// Date as written on the note (DD/MM/YY); today when absent.
    #[serde(default)]
    pub fecha: Option<String>,
    pub salida: String,
    pub entrada: String,
    #[serde(default)]
    pub comentarios: Option<String>,
}

impl FormFillRequest {
    pub fn from_note(note: &ParsedNote, form: &FormSection) -> Self {
        Self {
            items: note.items.clone(),
            fecha: note.fecha.clone(),
            salida: form.salida.clone(),
            entrada: form.entrada.clone(),
            comentarios: None,
        }
    }
}

/// How a single field is filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldInput {
    /// MM/DD/YYYY.
    Date { value: String },
    /// Searchable select: type `search`, then pick the option equal to `value`.
    Dropdown { value: String, search: String },
    Text { value: String },
    Number { value: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub label: String,
    #[serde(flatten)]
    pub input: FieldInput,
}

impl FieldEntry {
    fn new(label: impl Into<String>, input: FieldInput) -> Self {
        Self {
            label: label.into(),
            input,
        }
    }

    fn dropdown(label: impl Into<String>, value: &str) -> Self {
        Self::new(
            label,
            FieldInput::Dropdown {
                value: value.to_string(),
                search: value.chars().take(SEARCH_CHARS).collect(),
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPlan {
    pub url: String,
    pub fields: Vec<FieldEntry>,
    pub items_filled: usize,
}

/// Result the form-filling side reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFillResponse {
    pub success: bool,
    pub message: String,
    pub items_filled: usize,
    #[serde(default)]
    pub screenshot_path: Option<String>,
}

/// Lay out every field of the form in the order it must be filled.
///
/// The item count goes in before the item rows since the form only shows
/// as many product rows as that field says.
pub fn build_plan(request: &FormFillRequest, url: &str, today: Date) -> FormPlan {
    let fecha = request
        .fecha
        .as_deref()
        .map_or_else(|| format_form_date(today), to_form_date);
    let comentarios = request
        .comentarios
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COMENTARIOS);

    let mut fields = vec![
        FieldEntry::new("Fecha", FieldInput::Date { value: fecha }),
        FieldEntry::dropdown("SALIDA", &request.salida),
        FieldEntry::dropdown("ENTRADA", &request.entrada),
        FieldEntry::new(
            "Comentarios",
            FieldInput::Text {
                value: comentarios.to_string(),
            },
        ),
        FieldEntry::new(
            "Cantidad de items",
            FieldInput::Number {
                value: request.items.len() as i64,
            },
        ),
    ];

    for (i, item) in request.items.iter().enumerate() {
        let n = i + 1;
        let value = item.form_value.as_deref().unwrap_or(&item.product);
        fields.push(FieldEntry::dropdown(format!("{n:02}.Producto"), value));
        fields.push(FieldEntry::new(
            format!("{n:02}.Cantidad"),
            FieldInput::Number {
                value: item.quantity,
            },
        ));
    }

    FormPlan {
        url: url.to_string(),
        fields,
        items_filled: request.items.len(),
    }
}

/// Note date (DD/MM/YY or DD/MM/YYYY) to the form's MM/DD/YYYY.
/// Anything else is handed over untouched.
pub fn to_form_date(fecha: &str) -> String {
    reorder_note_date(fecha).unwrap_or_else(|| fecha.to_string())
}

fn reorder_note_date(fecha: &str) -> Option<String> {
    let re = Regex::new(r"^\s*(\d{1,2})/(\d{1,2})/(\d{2}|\d{4})\s*$").ok()?;
    let cap = re.captures(fecha)?;
    let (day, month, year) = (&cap[1], &cap[2], &cap[3]);
    let year = if year.len() == 2 {
        format!("20{year}")
    } else {
        year.to_string()
    };
    Some(format!("{month}/{day}/{year}"))
}

pub fn format_form_date(date: Date) -> String {
    format!(
        "{:02}/{:02}/{:04}",
        u8::from(date.month()),
        date.day(),
        date.year()
    )
}
