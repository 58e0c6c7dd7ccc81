//! Product-name lookup against the stock-movement form's dropdown options.
//!
//! The table is scanned top to bottom and the first key contained in the
//! normalized name wins, so a key must never sit above a longer key it is a
//! substring of unless both map to the same option.

/// Fragment of a handwritten product name → exact form option.
///
/// Snapshot of the form's product dropdown; update it whenever the form's
/// options change.
pub const CATALOG: &[(&str, &str)] = &[
    // Equipment
    ("equipo lago", "EQUIPO | cooler | LAGO"),
    ("equipo rio", "EQUIPO | cooler | RIO"),
    ("romi plus", "EQUIPO | purificador | Romi Plus"),
    ("tanque hidroneumatico", "EQUIPO | tanque | Tanque Hidro. 4G"),
    ("tanque hidroneumático", "EQUIPO | tanque | Tanque Hidro. 4G"),
    // CO2
    ("tubo de co2 2.5", "CO2 | tubo | Tubo de co2 de 2,5 Kg"),
    ("tubo de co2 2,5", "CO2 | tubo | Tubo de co2 de 2,5 Kg"),
    ("tubo de co2 3", "CO2 | tubo | Tubo de co2 de 3 Kg"),
    ("tubo de co2 5", "CO2 | tubo | Tubo de co2 de 5 Kg"),
    ("tubo de co2 5kg", "CO2 | tubo | Tubo de co2 de 5 Kg"),
    ("tubos de co2 5kg", "CO2 | tubo | Tubo de co2 de 5 Kg"),
    ("tubo de co2 8", "CO2 | tubo | Tubo de co2 de 8 Kg"),
    ("tubo de co2 10", "CO2 | tubo | Tubo de co2 de 10 Kg"),
    ("regulador zerica", "CO2 | regulador | Zerica"),
    ("regulador talos", "CO2 | regulador | Talos"),
    ("manometro", "CO2 | regulador | Zerica"),
    ("manómetro", "CO2 | regulador | Zerica"),
    // Connectors
    ("conector recto 8-6", "CONECTOR | acople rapido | 8-6"),
    ("conector 1/8-8", "CONECTOR | acople rapido | Rosca macho 1/8 - 8"),
    ("llave de paso 6-6", "CONECTOR | llave de paso | 6-6"),
    ("llave de paso 1/4-6", "CONECTOR | llave de paso | 1/4-6"),
    ("bifurcacion y 6-6-6", "CONECTOR | acople rapido - bifurcacion Y | 6-6-6"),
    ("bifurcación y 6-6-6", "CONECTOR | acople rapido - bifurcacion Y | 6-6-6"),
    ("llave de ai", "CONECTOR | llave de paso | 6-6"),
    // Bottles and caps
    ("botellas cantaro 500", "ENVASADO | botellas | Cantaro 500"),
    ("botellas cántaro 500", "ENVASADO | botellas | Cantaro 500"),
    ("tapas cantaro plateadas", "ENVASADO | tapas | Tapas Cantaro Plateadas"),
    ("tapas cántaro plateadas", "ENVASADO | tapas | Tapas Cantaro Plateadas"),
    ("tapas cantaro negras", "ENVASADO | tapas | Tapas Cantaro Negras"),
    ("tapas cántaro negras", "ENVASADO | tapas | Tapas Cantaro Negras"),
    // Accessories
    ("bandeja de goteo", "EQUIPO | cooler | Bandeja metalica LAGO"),
    ("cable interlock", "INSUMO | cooler | Cable interlock 220 volt"),
    ("cable interlock 220v", "INSUMO | cooler | Cable interlock 220 volt"),
    ("protector de tension", "INSUMO | cooler | Protector de tension"),
    ("protector de tensión", "INSUMO | cooler | Protector de tension"),
    ("cepillo de limpieza", "REPUESTOS | limpieza | Cepillos botellas"),
    ("cepillo limpieza", "REPUESTOS | limpieza | Cepillos botellas"),
    // Purifier spares
    ("fuente", "REPUESTOS | purificador | Fuente de 220 a 24 volt"),
];

/// Lowercase and trim; only ever used for matching.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// First catalog option whose key is contained in `name`, if any.
pub fn lookup(name: &str) -> Option<&'static str> {
    let normalized = normalize(name);
    if normalized.is_empty() {
        return None;
    }
    CATALOG
        .iter()
        .find(|(key, _)| normalized.contains(key))
        .map(|&(_, value)| value)
}

/// Map a product name to its form dropdown value.
///
/// Names with no catalog entry come back unchanged so a reviewer can fix them
/// on the form.
pub fn map_to_form_value(name: &str) -> String {
    lookup(name).map_or_else(|| name.to_string(), str::to_string)
}

/// A key that hides a later, longer key mapping to a different option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadowing {
    pub key: &'static str,
    pub hidden: &'static str,
}

/// Every pair where an earlier key would swallow a later key with a
/// different value. Empty for a well-ordered table.
pub fn shadowed_entries() -> Vec<Shadowing> {
    let mut found = Vec::new();
    for (i, &(key, value)) in CATALOG.iter().enumerate() {
        for &(later, later_value) in &CATALOG[i + 1..] {
            if later.contains(key) && later_value != value {
                found.push(Shadowing { key, hidden: later });
            }
        }
    }
    found
}
