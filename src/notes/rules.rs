//! Business rules: lines a delivery note implies but never spells out.
//!
//! Runs in two phases. [`Detection::scan`] reads the extracted items once and
//! records what the note contains; then every entry in [`RULES`] runs in order
//! against that record and the items synthesized so far. A rule that adds a
//! regulator patches the record (see [`Detection::observe`]) so the connector
//! rule after it sees the new regulator.
//!
//! Rules:
//! 1. Equipo Lago/Rio → Cable Interlock 220V
//! 2. Romi Plus → Conector Recto 8-6 + Llave de paso 6-6
//! 3. Tanque Hidroneumático → Bifurcación Y 6-6-6 + Llave de paso 1/4-6
//! 4. Tubo CO2 without regulator → Regulador (ZERICA for Lago, TALOS for Rio)
//! 5. Any regulator → Conector 1/8-8
//! 6. Equipo Lago → Bandeja de Goteo (shipped inside the cooler)
//! 7. Botellas Cántaro 500 → half silver caps, half black caps

use super::catalog::map_to_form_value;
use super::{Item, ParsedNote};
use tracing::debug;

pub const CABLE_INTERLOCK: &str = "Cable Interlock 220V";
pub const CONECTOR_RECTO_8_6: &str = "Conector Recto 8-6";
pub const LLAVE_PASO_6_6: &str = "Llave de paso 6-6";
pub const BIFURCACION_Y: &str = "Bifurcación Y 6-6-6";
pub const LLAVE_PASO_1_4_6: &str = "Llave de paso 1/4-6";
pub const REGULADOR_ZERICA: &str = "Regulador ZERICA";
pub const REGULADOR_TALOS: &str = "Regulador TALOS";
pub const REGULADOR_GENERICO: &str = "Regulador/Manómetro";
pub const CONECTOR_1_8_8: &str = "Conector 1/8-8";
pub const BANDEJA_GOTEO: &str = "Bandeja de Goteo (incluida con Lago)";
pub const TAPAS_PLATEADAS: &str = "Tapas Cántaro Plateadas";
pub const TAPAS_NEGRAS: &str = "Tapas Cántaro Negras";

/// What the extracted items contain, computed once per note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Detection {
    pub has_lago: bool,
    pub has_rio: bool,
    pub has_romi_plus: bool,
    pub has_tanque_hidro: bool,
    pub has_tubo_co2: bool,
    pub has_regulator: bool,
    /// Quantity of the last "botellas cántaro 500" line, 0 if none.
    pub cantaro_500_qty: i64,
}

impl Detection {
    pub fn scan(items: &[Item]) -> Self {
        let mut d = Self::default();
        for item in items {
            let n = item.normalized();
            d.has_lago |= is_lago(&n);
            d.has_rio |= is_rio(&n);
            d.has_romi_plus |= is_romi(&n);
            d.has_tanque_hidro |= is_tanque_hidro(&n);
            d.has_tubo_co2 |= is_tubo_co2(&n);
            d.has_regulator |= is_regulator(&n);
            if is_cantaro_500(&n) {
                d.cantaro_500_qty = item.quantity;
            }
        }
        d
    }

    /// Fold in lines a rule just synthesized. Only the regulator flag can be
    /// raised by a synthesized line that a later rule depends on.
    pub fn observe(self, added: &[Item]) -> Self {
        Self {
            has_regulator: self.has_regulator
                || added.iter().any(|i| is_regulator(&i.normalized())),
            ..self
        }
    }
}

fn is_lago(n: &str) -> bool {
    // also covers "equipo lago"
    n.contains("lago")
}

fn is_rio(n: &str) -> bool {
    // also covers "equipo rio"; bare "rio" hits words like "accesorio" too
    n.contains("rio") && !n.contains("purificador")
}

fn is_romi(n: &str) -> bool {
    n.contains("romi")
}

fn is_tanque_hidro(n: &str) -> bool {
    n.contains("tanque") && n.contains("hidro")
}

fn is_tubo_co2(n: &str) -> bool {
    n.contains("tubo") && n.contains("co2")
}

fn is_regulator(n: &str) -> bool {
    n.contains("regulador") || n.contains("manómetro") || n.contains("manometro")
}

fn is_cantaro_500(n: &str) -> bool {
    n.contains("botellas") && n.contains("cantaro") && n.contains("500")
}

/// Input handed to each rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub detection: &'a Detection,
    /// Items from the note, already mapped.
    pub existing: &'a [Item],
    /// Items added by earlier rules in this run.
    pub synthesized: &'a [Item],
}

impl RuleInput<'_> {
    fn existing_any(&self, pred: impl Fn(&Item) -> bool) -> bool {
        self.existing.iter().any(pred)
    }
}

pub type Rule = fn(&RuleInput<'_>) -> Vec<Item>;

/// Evaluation order is part of the contract.
pub const RULES: &[(&str, Rule)] = &[
    ("interlock", interlock),
    ("romi_plus_accessories", romi_plus_accessories),
    ("tanque_hidro_accessories", tanque_hidro_accessories),
    ("co2_regulator", co2_regulator),
    ("regulator_connector", regulator_connector),
    ("lago_drip_tray", lago_drip_tray),
    ("cantaro_caps", cantaro_caps),
];

pub fn interlock(input: &RuleInput<'_>) -> Vec<Item> {
    let d = input.detection;
    if !(d.has_lago || d.has_rio) {
        return Vec::new();
    }
    if input.existing_any(|i| i.normalized().contains("cable interlock")) {
        return Vec::new();
    }
    vec![Item::inferred(CABLE_INTERLOCK, 1)]
}

pub fn romi_plus_accessories(input: &RuleInput<'_>) -> Vec<Item> {
    let mut added = Vec::new();
    if !input.detection.has_romi_plus {
        return added;
    }
    if !input.existing_any(|i| i.normalized().contains("conector") && i.product.contains("8-6")) {
        added.push(Item::inferred(CONECTOR_RECTO_8_6, 1));
    }
    if !input.existing_any(|i| i.normalized().contains("llave") && i.product.contains("6-6")) {
        added.push(Item::inferred(LLAVE_PASO_6_6, 1));
    }
    added
}

pub fn tanque_hidro_accessories(input: &RuleInput<'_>) -> Vec<Item> {
    let mut added = Vec::new();
    if !input.detection.has_tanque_hidro {
        return added;
    }
    let has_bifurcacion = input.existing_any(|i| {
        let n = i.normalized();
        n.contains("bifurcacion") || n.contains("bifurcación")
    });
    if !has_bifurcacion {
        added.push(Item::inferred(BIFURCACION_Y, 1));
    }
    if !input.existing_any(|i| i.normalized().contains("llave") && i.product.contains("1/4")) {
        added.push(Item::inferred(LLAVE_PASO_1_4_6, 1));
    }
    added
}

/// Regulator brand follows the cooler it feeds: ZERICA for Lago, TALOS for Rio.
pub fn co2_regulator(input: &RuleInput<'_>) -> Vec<Item> {
    let d = input.detection;
    if !d.has_tubo_co2 || d.has_regulator {
        return Vec::new();
    }
    let product = if d.has_lago {
        REGULADOR_ZERICA
    } else if d.has_rio {
        REGULADOR_TALOS
    } else {
        REGULADOR_GENERICO
    };
    vec![Item::inferred(product, 1)]
}

pub fn regulator_connector(input: &RuleInput<'_>) -> Vec<Item> {
    if !input.detection.has_regulator {
        return Vec::new();
    }
    let has_connector = input
        .existing
        .iter()
        .chain(input.synthesized)
        .any(|i| i.product.contains("1/8"));
    if has_connector {
        return Vec::new();
    }
    vec![Item::inferred(CONECTOR_1_8_8, 1)]
}

/// The tray ships inside every Lago but still has to be a stock-movement line.
pub fn lago_drip_tray(input: &RuleInput<'_>) -> Vec<Item> {
    if !input.detection.has_lago || input.existing_any(|i| i.normalized().contains("bandeja")) {
        return Vec::new();
    }
    vec![Item::inferred(BANDEJA_GOTEO, 1)]
}

pub fn cantaro_caps(input: &RuleInput<'_>) -> Vec<Item> {
    let mut added = Vec::new();
    let total = input.detection.cantaro_500_qty;
    if total <= 0 {
        return added;
    }
    let (silver, black) = split_caps(total);
    if !input.existing_any(|i| i.normalized().contains("plateada")) {
        added.push(Item::inferred(TAPAS_PLATEADAS, silver));
    }
    if !input.existing_any(|i| i.normalized().contains("negra")) {
        added.push(Item::inferred(TAPAS_NEGRAS, black));
    }
    added
}

/// Split a bottle count into (silver, black) caps; odd totals give the extra
/// cap to black.
pub fn split_caps(total: i64) -> (i64, i64) {
    let silver = total.div_euclid(2);
    (silver, total - silver)
}

/// Map every item and append whatever the rules infer.
///
/// Never fails and never touches `note`; metadata is copied as-is.
pub fn apply_business_rules(note: &ParsedNote) -> ParsedNote {
    let existing: Vec<Item> = note
        .items
        .iter()
        .map(|item| Item {
            form_value: Some(map_to_form_value(&item.product)),
            ..item.clone()
        })
        .collect();

    let mut detection = Detection::scan(&existing);
    debug!(?detection, items = existing.len(), "Detection pass");

    let mut synthesized: Vec<Item> = Vec::new();
    for &(name, rule) in RULES {
        let added = rule(&RuleInput {
            detection: &detection,
            existing: &existing,
            synthesized: &synthesized,
        });
        if added.is_empty() {
            continue;
        }
        debug!(
            rule = name,
            added = ?added.iter().map(|i| i.product.as_str()).collect::<Vec<_>>(),
            "Rule fired"
        );
        detection = detection.observe(&added);
        synthesized.extend(added);
    }

    let mut items = existing;
    items.extend(synthesized);

    ParsedNote {
        items,
        raw_text: note.raw_text.clone(),
        client_name: note.client_name.clone(),
        remito_number: note.remito_number.clone(),
        fecha: note.fecha.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(names: &[(&str, i64)]) -> Vec<Item> {
        names
            .iter()
            .map(|&(p, q)| Item {
                form_value: Some(map_to_form_value(p)),
                ..Item::extracted(p, q)
            })
            .collect()
    }

    fn run(rule: Rule, items: &[Item], synthesized: &[Item]) -> Vec<String> {
        let detection = Detection::scan(items);
        rule(&RuleInput {
            detection: &detection,
            existing: items,
            synthesized,
        })
        .into_iter()
        .map(|i| i.product)
        .collect()
    }

    #[test]
    fn detection_flags() {
        let d = Detection::scan(&mapped(&[
            ("EQUIPO LAGO", 1),
            ("Tanque Hidroneumático", 1),
            ("TUBO DE CO2 (3KG)", 2),
            ("BOTELLAS CANTARO 500", 4),
        ]));
        assert!(d.has_lago);
        assert!(!d.has_rio);
        assert!(d.has_tanque_hidro);
        assert!(d.has_tubo_co2);
        assert!(!d.has_regulator);
        assert_eq!(d.cantaro_500_qty, 4);
    }

    #[test]
    fn purificador_does_not_count_as_rio() {
        let d = Detection::scan(&mapped(&[("Purificador Rio Negro", 1)]));
        assert!(!d.has_rio);
    }

    #[test]
    fn last_cantaro_line_wins() {
        let d = Detection::scan(&mapped(&[
            ("BOTELLAS CANTARO 500", 4),
            ("BOTELLAS CANTARO 500", 9),
        ]));
        assert_eq!(d.cantaro_500_qty, 9);
    }

    #[test]
    fn observe_raises_regulator_only() {
        let d = Detection::default().observe(&[
            Item::inferred(REGULADOR_TALOS, 1),
            Item::inferred(BANDEJA_GOTEO, 1),
        ]);
        assert!(d.has_regulator);
        assert!(!d.has_lago);
    }

    #[test]
    fn interlock_skipped_when_present() {
        let items = mapped(&[("EQUIPO RIO", 1), ("cable interlock", 1)]);
        assert!(run(interlock, &items, &[]).is_empty());
    }

    #[test]
    fn romi_checks_are_independent() {
        let items = mapped(&[("ROMI PLUS", 1), ("Llave de paso 6-6", 2)]);
        assert_eq!(run(romi_plus_accessories, &items, &[]), [CONECTOR_RECTO_8_6]);

        // "8-6" is not enough without "conector"
        let items = mapped(&[("ROMI PLUS", 1), ("Codo 8-6", 1)]);
        assert_eq!(
            run(romi_plus_accessories, &items, &[]),
            [CONECTOR_RECTO_8_6, LLAVE_PASO_6_6]
        );
    }

    #[test]
    fn tanque_accessories() {
        let items = mapped(&[("TANQUE HIDRONEUMATICO", 1), ("Bifurcacion Y", 1)]);
        assert_eq!(run(tanque_hidro_accessories, &items, &[]), [LLAVE_PASO_1_4_6]);

        let items = mapped(&[("TANQUE HIDRONEUMATICO", 1)]);
        assert_eq!(
            run(tanque_hidro_accessories, &items, &[]),
            [BIFURCACION_Y, LLAVE_PASO_1_4_6]
        );
    }

    #[test]
    fn regulator_brand_priority() {
        let both = mapped(&[("EQUIPO LAGO", 1), ("EQUIPO RIO", 1), ("TUBO CO2", 1)]);
        assert_eq!(run(co2_regulator, &both, &[]), [REGULADOR_ZERICA]);

        let rio = mapped(&[("EQUIPO RIO", 1), ("TUBO CO2", 1)]);
        assert_eq!(run(co2_regulator, &rio, &[]), [REGULADOR_TALOS]);

        let bare = mapped(&[("TUBO DE CO2 (8KG)", 1)]);
        let added = co2_regulator(&RuleInput {
            detection: &Detection::scan(&bare),
            existing: &bare,
            synthesized: &[],
        });
        assert_eq!(added[0].product, REGULADOR_GENERICO);
        assert_eq!(added[0].form_value.as_deref(), Some("CO2 | regulador | Zerica"));
    }

    #[test]
    fn regulator_connector_sees_synthesized_items() {
        let items = mapped(&[("MANOMETRO", 1)]);
        let prior = [Item::inferred(CONECTOR_1_8_8, 1)];
        assert!(run(regulator_connector, &items, &prior).is_empty());
        assert_eq!(run(regulator_connector, &items, &[]), [CONECTOR_1_8_8]);
    }

    #[test]
    fn drip_tray_only_for_lago() {
        assert_eq!(
            run(lago_drip_tray, &mapped(&[("EQUIPO LAGO", 1)]), &[]),
            [BANDEJA_GOTEO]
        );
        assert!(run(lago_drip_tray, &mapped(&[("EQUIPO RIO", 1)]), &[]).is_empty());
        assert!(
            run(
                lago_drip_tray,
                &mapped(&[("EQUIPO LAGO", 1), ("BANDEJA DE GOTEO", 1)]),
                &[]
            )
            .is_empty()
        );
    }

    #[test]
    fn caps_added_per_missing_color() {
        let items = mapped(&[("BOTELLAS CANTARO 500", 6), ("TAPAS CANTARO NEGRAS", 3)]);
        let detection = Detection::scan(&items);
        let added = cantaro_caps(&RuleInput {
            detection: &detection,
            existing: &items,
            synthesized: &[],
        });
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].product, TAPAS_PLATEADAS);
        assert_eq!(added[0].quantity, 3);
    }

    #[test]
    fn zero_bottles_add_no_caps() {
        assert!(run(cantaro_caps, &mapped(&[("BOTELLAS CANTARO 500", 0)]), &[]).is_empty());
        assert!(run(cantaro_caps, &mapped(&[("BOTELLAS CANTARO 500", -3)]), &[]).is_empty());
    }

    #[test]
    fn split_gives_remainder_to_black() {
        assert_eq!(split_caps(7), (3, 4));
        assert_eq!(split_caps(1), (0, 1));
        assert_eq!(split_caps(10), (5, 5));
    }

    #[test]
    fn input_note_is_left_alone() {
        let note = ParsedNote {
            items: vec![Item::extracted("EQUIPO LAGO", 1)],
            fecha: Some("03/02/25".into()),
            ..ParsedNote::default()
        };
        let before = note.clone();
        let out = apply_business_rules(&note);
        assert_eq!(note, before);
        assert_eq!(out.fecha, before.fecha);
        assert_eq!(out.items[0].form_value.as_deref(), Some("EQUIPO | cooler | LAGO"));
        assert!(!out.items[0].is_auto_added);
    }
}
