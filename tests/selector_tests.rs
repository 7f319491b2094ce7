mod common;

use acta_certificados_server::certificate::fields::{LogicalPage, PageFieldSet, PAGE1_FIELDS};
use acta_certificados_server::certificate::selectors::{
    ControlKind, SelectorCategory, SelectorTable,
};
use acta_certificados_server::certificate::template::TemplateDocument;
use common::{appearance_state, kid_states, text_value, TemplateFixture};

fn working(fixture: &TemplateFixture) -> acta_certificados_server::certificate::template::WorkingDocument {
    TemplateDocument::from_bytes(&fixture.to_bytes())
        .unwrap()
        .working_copy()
}

#[test]
fn test_table_binds_each_option_once() {
    let document = working(&TemplateFixture::default());
    let table = SelectorTable::discover(&document, LogicalPage::Page2);

    assert!(!table.is_empty());
    assert!(table.unbound().is_empty());
    assert_eq!(
        table.bound_control(SelectorCategory::VehicleClass, "camion"),
        Some("clase_camion")
    );
    assert_eq!(
        table.bound_control(SelectorCategory::VehicleClass, "camioneta"),
        Some("clase_camioneta")
    );
    assert_eq!(
        table.bound_control(SelectorCategory::Refrigeration, "si"),
        Some("sistema_refrigeracion_si")
    );
    assert!(table
        .controls()
        .iter()
        .all(|control| matches!(control.kind, ControlKind::Checkbox(_))));
}

#[test]
fn test_radio_parent_is_an_exclusive_group() {
    let fixture = TemplateFixture {
        refrigeration_radio: true,
        ..TemplateFixture::default()
    };
    let document = working(&fixture);
    let table = SelectorTable::discover(&document, LogicalPage::Page2);

    let group = table
        .controls()
        .iter()
        .find(|control| control.name == "sistema_refrigeracion")
        .unwrap();
    match &group.kind {
        ControlKind::ExclusiveGroup(widgets) => assert_eq!(widgets.len(), 2),
        other => panic!("expected group, got {other:?}"),
    }
    assert_eq!(
        table.bound_control(SelectorCategory::Refrigeration, "no"),
        Some("sistema_refrigeracion")
    );
}

#[test]
fn test_resolution_turns_stale_controls_off() {
    let mut document = working(&TemplateFixture::default());
    let table = SelectorTable::discover(&document, LogicalPage::Page2);

    let activated = table
        .resolve(&mut document, SelectorCategory::VehicleClass, Some("otro"))
        .unwrap();
    assert_eq!(activated, vec!["clase_otro".to_string()]);

    let doc = document.document();
    assert_eq!(appearance_state(doc, "clase_otro").as_deref(), Some("Yes"));
    assert_eq!(appearance_state(doc, "clase_moto").as_deref(), Some("Off"));
    // the other category is untouched until resolved
    assert_eq!(
        appearance_state(doc, "sistema_refrigeracion_si").as_deref(),
        Some("Yes")
    );
}

#[test]
fn test_unrecognised_request_switches_everything_off() {
    let fixture = TemplateFixture {
        refrigeration_radio: true,
        ..TemplateFixture::default()
    };
    let mut document = working(&fixture);
    let table = SelectorTable::discover(&document, LogicalPage::Page2);

    let activated = table
        .resolve(&mut document, SelectorCategory::Refrigeration, None)
        .unwrap();
    assert!(activated.is_empty());
    assert!(kid_states(document.document(), "sistema_refrigeracion")
        .iter()
        .all(|(_, state)| state == "Off"));
}

#[test]
fn test_page_without_buttons_gives_empty_table() {
    let document = working(&TemplateFixture::default());
    assert!(SelectorTable::discover(&document, LogicalPage::Page1).is_empty());
    assert!(SelectorTable::discover(&document, LogicalPage::Page3).is_empty());
}

#[test]
fn test_field_names_match_page_schema() {
    let document = working(&TemplateFixture::default());
    let names = document.field_names(LogicalPage::Page1);
    assert_eq!(names.len(), PAGE1_FIELDS.len());
    assert!(PAGE1_FIELDS.iter().all(|name| names.contains(*name)));
    assert!(document.field_names(LogicalPage::Page3).is_empty());
}

#[test]
fn test_apply_fields_reports_missing_names() {
    let fixture = TemplateFixture {
        page2_annotations: false,
        ..TemplateFixture::default()
    };
    let mut document = working(&fixture);

    let mut set = PageFieldSet::new(LogicalPage::Page2);
    set.insert("placa_2", "PRY576");
    let report = document.apply_fields(&set).unwrap().unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(report.missing, vec!["placa_2".to_string()]);

    let mut set = PageFieldSet::new(LogicalPage::Page1);
    set.insert("placa", "PRY576");
    let report = document.apply_fields(&set).unwrap().unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(text_value(document.document(), "placa").as_deref(), Some("PRY576"));
}

#[test]
fn test_apply_fields_on_absent_page() {
    let fixture = TemplateFixture {
        pages: 1,
        ..TemplateFixture::default()
    };
    let mut document = working(&fixture);
    let mut set = PageFieldSet::new(LogicalPage::Page4);
    set.insert("fecha_firma_dia", "20");
    assert!(document.apply_fields(&set).unwrap().is_none());
}

#[test]
fn test_second_control_for_an_option_stays_off() {
    let fixture = TemplateFixture {
        extra_checkboxes: vec!["clase_camion_remolque"],
        stale_on: vec!["clase_camion_remolque"],
        ..TemplateFixture::default()
    };
    let mut document = working(&fixture);
    let table = SelectorTable::discover(&document, LogicalPage::Page2);

    assert_eq!(
        table.bound_control(SelectorCategory::VehicleClass, "camion"),
        Some("clase_camion")
    );
    assert_eq!(
        table.duplicates(),
        &[(SelectorCategory::VehicleClass, "clase_camion_remolque".to_string())]
    );

    let activated = table
        .resolve(&mut document, SelectorCategory::VehicleClass, Some("camion"))
        .unwrap();
    assert_eq!(activated, vec!["clase_camion".to_string()]);

    let doc = document.document();
    assert_eq!(appearance_state(doc, "clase_camion").as_deref(), Some("Yes"));
    assert_eq!(
        appearance_state(doc, "clase_camion_remolque").as_deref(),
        Some("Off")
    );
}
