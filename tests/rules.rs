use proptest::prelude::*;
use remito_ingest::notes::rules::{
    BANDEJA_GOTEO, BIFURCACION_Y, CABLE_INTERLOCK, CONECTOR_1_8_8, CONECTOR_RECTO_8_6,
    LLAVE_PASO_1_4_6, LLAVE_PASO_6_6, REGULADOR_TALOS, REGULADOR_ZERICA, TAPAS_NEGRAS,
    TAPAS_PLATEADAS, split_caps,
};
use remito_ingest::notes::{Item, ParsedNote, apply_business_rules};

fn note(items: &[(&str, i64)]) -> ParsedNote {
    ParsedNote {
        items: items
            .iter()
            .map(|&(p, q)| Item::extracted(p, q))
            .collect(),
        client_name: Some("Cliente SA".to_string()),
        remito_number: Some("0001-00012345".to_string()),
        fecha: Some("14/03/25".to_string()),
        raw_text: None,
    }
}

fn added(out: &ParsedNote) -> Vec<(&str, i64)> {
    out.items
        .iter()
        .filter(|i| i.is_auto_added)
        .map(|i| (i.product.as_str(), i.quantity))
        .collect()
}

fn form_value<'a>(out: &'a ParsedNote, product: &str) -> Option<&'a str> {
    out.items
        .iter()
        .find(|i| i.product == product)
        .and_then(|i| i.form_value.as_deref())
}

#[test]
fn lago_gets_interlock_and_tray() {
    let out = apply_business_rules(&note(&[("EQUIPO LAGO", 1)]));
    assert_eq!(added(&out), [(CABLE_INTERLOCK, 1), (BANDEJA_GOTEO, 1)]);
    assert_eq!(
        form_value(&out, CABLE_INTERLOCK),
        Some("INSUMO | cooler | Cable interlock 220 volt")
    );
    assert_eq!(
        form_value(&out, BANDEJA_GOTEO),
        Some("EQUIPO | cooler | Bandeja metalica LAGO")
    );
}

#[test]
fn romi_plus_gets_connector_and_valve() {
    let out = apply_business_rules(&note(&[("ROMI PLUS", 1)]));
    assert_eq!(added(&out), [(CONECTOR_RECTO_8_6, 1), (LLAVE_PASO_6_6, 1)]);
    assert_eq!(
        form_value(&out, CONECTOR_RECTO_8_6),
        Some("CONECTOR | acople rapido | 8-6")
    );
    assert_eq!(
        form_value(&out, LLAVE_PASO_6_6),
        Some("CONECTOR | llave de paso | 6-6")
    );
}

#[test]
fn rio_with_co2_gets_talos_regulator_and_connector() {
    let out = apply_business_rules(&note(&[("EQUIPO RIO", 1), ("TUBO DE CO2 (5KG)", 2)]));
    assert_eq!(
        added(&out),
        [(CABLE_INTERLOCK, 1), (REGULADOR_TALOS, 1), (CONECTOR_1_8_8, 1)]
    );
    assert_eq!(form_value(&out, REGULADOR_TALOS), Some("CO2 | regulador | Talos"));
    assert_eq!(
        form_value(&out, CONECTOR_1_8_8),
        Some("CONECTOR | acople rapido | Rosca macho 1/8 - 8")
    );
}

#[test]
fn lago_with_co2_gets_zerica() {
    let out = apply_business_rules(&note(&[("EQUIPO LAGO", 1), ("TUBO DE CO2 (3KG)", 1)]));
    assert_eq!(
        added(&out),
        [
            (CABLE_INTERLOCK, 1),
            (REGULADOR_ZERICA, 1),
            (CONECTOR_1_8_8, 1),
            (BANDEJA_GOTEO, 1)
        ]
    );
}

#[test]
fn cantaro_caps_split_odd_total() {
    let out = apply_business_rules(&note(&[("BOTELLAS CANTARO 500", 7)]));
    assert_eq!(added(&out), [(TAPAS_PLATEADAS, 3), (TAPAS_NEGRAS, 4)]);
    assert_eq!(
        form_value(&out, TAPAS_PLATEADAS),
        Some("ENVASADO | tapas | Tapas Cantaro Plateadas")
    );
    assert_eq!(
        form_value(&out, TAPAS_NEGRAS),
        Some("ENVASADO | tapas | Tapas Cantaro Negras")
    );
}

#[test]
fn existing_manometro_still_gets_connector() {
    let out = apply_business_rules(&note(&[
        ("EQUIPO LAGO", 1),
        ("TUBO DE CO2 (3KG)", 1),
        ("MANOMETRO", 1),
    ]));
    let products: Vec<&str> = added(&out).into_iter().map(|(p, _)| p).collect();
    assert!(!products.contains(&REGULADOR_ZERICA));
    assert_eq!(products, [CABLE_INTERLOCK, CONECTOR_1_8_8, BANDEJA_GOTEO]);
}

#[test]
fn tanque_gets_bifurcation_and_valve() {
    let out = apply_business_rules(&note(&[("TANQUE HIDRONEUMATICO", 1)]));
    assert_eq!(added(&out), [(BIFURCACION_Y, 1), (LLAVE_PASO_1_4_6, 1)]);
    assert_eq!(
        form_value(&out, BIFURCACION_Y),
        Some("CONECTOR | acople rapido - bifurcacion Y | 6-6-6")
    );
    assert_eq!(
        form_value(&out, LLAVE_PASO_1_4_6),
        Some("CONECTOR | llave de paso | 1/4-6")
    );
}

#[test]
fn metadata_and_original_order_are_kept() {
    let input = note(&[("ROMI PLUS", 1), ("Escalera", 3), ("EQUIPO LAGO", 2)]);
    let out = apply_business_rules(&input);

    assert_eq!(out.client_name, input.client_name);
    assert_eq!(out.remito_number, input.remito_number);
    assert_eq!(out.fecha, input.fecha);
    assert_eq!(out.raw_text, input.raw_text);

    let originals: Vec<&str> = out.items[..3].iter().map(|i| i.product.as_str()).collect();
    assert_eq!(originals, ["ROMI PLUS", "Escalera", "EQUIPO LAGO"]);
    assert!(out.items[..3].iter().all(|i| !i.is_auto_added));
    assert!(out.items[3..].iter().all(|i| i.is_auto_added));
    // unmapped product keeps its own name as form value
    assert_eq!(out.items[1].form_value.as_deref(), Some("Escalera"));
    assert_eq!(out.unmapped_items().len(), 1);
}

#[test]
fn nothing_to_infer() {
    let out = apply_business_rules(&note(&[("PROTECTOR DE TENSION", 2), ("FUENTE", 1)]));
    assert_eq!(out.items.len(), 2);
    assert_eq!(out.auto_added_count(), 0);
    assert!(out.items.iter().all(|i| i.form_value.is_some()));
}

#[test]
fn empty_note_stays_empty() {
    let out = apply_business_rules(&ParsedNote::default());
    assert!(out.items.is_empty());
}

#[test]
fn only_missing_cap_color_is_added() {
    let out = apply_business_rules(&note(&[
        ("BOTELLAS CANTARO 500", 8),
        ("TAPAS CANTARO PLATEADAS", 4),
    ]));
    assert_eq!(added(&out), [(TAPAS_NEGRAS, 4)]);
}

#[test]
fn bare_rio_substring_triggers_interlock() {
    // "rio" inside an unrelated word still counts as a Rio cooler
    let out = apply_business_rules(&note(&[("ACCESORIO VARIOS", 1)]));
    assert_eq!(added(&out), [(CABLE_INTERLOCK, 1)]);
}

#[test]
fn non_positive_quantities_pass_through() {
    let out = apply_business_rules(&note(&[("EQUIPO LAGO", 0), ("BOTELLAS CANTARO 500", -2)]));
    assert_eq!(out.items[0].quantity, 0);
    assert_eq!(out.items[1].quantity, -2);
    assert_eq!(added(&out), [(CABLE_INTERLOCK, 1), (BANDEJA_GOTEO, 1)]);
}

#[test]
fn rerunning_adds_nothing() {
    let inputs = [
        note(&[("EQUIPO LAGO", 1)]),
        note(&[("ROMI PLUS", 1)]),
        note(&[("EQUIPO RIO", 1), ("TUBO DE CO2 (5KG)", 2)]),
        note(&[("TUBO DE CO2 (8KG)", 1)]),
        note(&[("TANQUE HIDRONEUMATICO", 1), ("BOTELLAS CANTARO 500", 5)]),
        note(&[
            ("EQUIPO LAGO", 1),
            ("EQUIPO RIO", 1),
            ("ROMI PLUS", 2),
            ("TANQUE HIDRONEUMÁTICO", 1),
            ("TUBOS DE CO2 5KG", 3),
            ("BOTELLAS CÁNTARO 500", 9),
        ]),
    ];
    for input in &inputs {
        let once = apply_business_rules(input);
        let twice = apply_business_rules(&once);
        assert_eq!(once, twice, "second pass changed {:?}", input.items);
    }
}

const PRODUCTS: &[&str] = &[
    "EQUIPO LAGO",
    "EQUIPO RIO",
    "ROMI PLUS",
    "TANQUE HIDRONEUMATICO",
    "TUBO DE CO2 (2.5KG)",
    "TUBO DE CO2 (10KG)",
    "MANOMETRO",
    "CABLE INTERLOCK 220V",
    "BANDEJA DE GOTEO",
    "BOTELLAS CANTARO 500",
    "BOTELLAS CANTARO 750",
    "TAPAS CANTARO PLATEADAS",
    "TAPAS CANTARO NEGRAS",
    "LLAVE DE PASO",
    "CONECTOR",
    "FUENTE",
    "Purificador",
];

fn arb_note() -> impl Strategy<Value = ParsedNote> {
    prop::collection::vec((prop::sample::select(PRODUCTS), 1i64..50), 0..8).prop_map(|items| {
        ParsedNote {
            items: items
                .into_iter()
                .map(|(p, q)| Item::extracted(p, q))
                .collect(),
            ..ParsedNote::default()
        }
    })
}

fn count_matching(out: &ParsedNote, pred: impl Fn(&Item) -> bool) -> usize {
    out.items.iter().filter(|i| pred(i)).count()
}

proptest! {
    #[test]
    fn cap_split_sums_to_total(q in 1i64..100_000) {
        let (silver, black) = split_caps(q);
        prop_assert_eq!(silver + black, q);
        prop_assert!(black >= silver);
        prop_assert!(black - silver <= 1);
    }

    #[test]
    fn rules_are_idempotent(input in arb_note()) {
        let once = apply_business_rules(&input);
        let twice = apply_business_rules(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn synthesized_lines_never_duplicate_present_ones(input in arb_note()) {
        let out = apply_business_rules(&input);
        let had = |pred: &dyn Fn(&Item) -> bool| input.items.iter().any(|i| pred(i));

        let interlock = |i: &Item| i.normalized().contains("cable interlock");
        let tray = |i: &Item| i.normalized().contains("bandeja");
        let connector_1_8 = |i: &Item| i.product.contains("1/8");

        for pred in [&interlock as &dyn Fn(&Item) -> bool, &tray, &connector_1_8] {
            if had(pred) {
                prop_assert_eq!(
                    count_matching(&out, |i| i.is_auto_added && pred(i)),
                    0
                );
            } else {
                prop_assert!(count_matching(&out, |i| pred(i)) <= 1);
            }
        }
    }

    #[test]
    fn originals_come_first_and_are_never_flagged(input in arb_note()) {
        let out = apply_business_rules(&input);
        let n = input.items.len();
        prop_assert!(out.items.len() >= n);
        for (before, after) in input.items.iter().zip(&out.items) {
            prop_assert_eq!(&before.product, &after.product);
            prop_assert_eq!(before.quantity, after.quantity);
            prop_assert!(!after.is_auto_added);
            prop_assert!(after.form_value.is_some());
        }
        prop_assert!(out.items[n..].iter().all(|i| i.is_auto_added));
    }
}
