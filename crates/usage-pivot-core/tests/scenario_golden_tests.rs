//! Golden tests for category flattening.
//!
//! Each case pins the flat rows produced for a known nested section and
//! checks that unflatten reproduces the nested JSON.

use serde_json::{json, Value};
use usage_pivot_core::draft::DraftAssembler;
use usage_pivot_core::models::{
    section_json_from_tree, section_tree_from_json, FeatureGates, KitUsageLine, KitUsageSection,
    LookupTables, ReferenceSummary, SectionState, UsageReport, UsageValue,
};
use usage_pivot_core::pivot::{flatten, unflatten, LeafIdentity, PivotError};
use usage_pivot_core::schema::{Category, ReferenceKind};

/// Test case from golden file.
struct GoldenCase {
    id: &'static str,
    category: Category,
    nested: Value,
    expected_rows: Vec<(Vec<&'static str>, Option<i64>, Option<&'static str>)>,
}

fn lookups() -> LookupTables {
    LookupTables::new()
        .with_regimen(ReferenceSummary::new("R", "1A", "TDF+3TC+EFV"))
        .with_orderable(ReferenceSummary::new("O-1", "C100", "Determine HIV"))
}

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "patient-two-levels",
            category: Category::Patient,
            nested: json!({"newSection2": {"new": {"id": "X", "value": 20}}}),
            expected_rows: vec![(vec!["newSection2", "new"], Some(20), Some("X"))],
        },
        GoldenCase {
            id: "regimen-foreign-level",
            category: Category::Regimen,
            nested: json!([{
                "regimenId": "R",
                "columns": {"community": {"id": "Y", "value": 6}}
            }]),
            expected_rows: vec![(vec!["R", "community"], Some(6), Some("Y"))],
        },
        GoldenCase {
            id: "test-consumption-three-levels",
            category: Category::TestConsumption,
            nested: json!([{
                "service": "HF",
                "projects": {"hivDetermine": {"outcomes": {"positive": {"id": "Z", "value": 2}}}}
            }]),
            expected_rows: vec![(vec!["HF", "hivDetermine", "positive"], Some(2), Some("Z"))],
        },
        GoldenCase {
            id: "consultation-blank-value",
            category: Category::ConsultationNumber,
            nested: json!({"consultations": {"new": {"id": "C", "value": null}}}),
            expected_rows: vec![(vec!["consultations", "new"], None, Some("C"))],
        },
        GoldenCase {
            id: "kit-usage-two-services",
            category: Category::KitUsage,
            nested: json!([{
                "collection": "kitReceived",
                "services": {
                    "CHW": {"id": "K2", "value": 3},
                    "HF": {"id": "K1", "value": 10}
                }
            }]),
            expected_rows: vec![
                (vec!["kitReceived", "CHW"], Some(3), Some("K2")),
                (vec!["kitReceived", "HF"], Some(10), Some("K1")),
            ],
        },
        GoldenCase {
            id: "usage-information-orderable",
            category: Category::UsageInformation,
            nested: json!([{
                "service": "HF",
                "informations": {
                    "existentStock": {
                        "orderables": {
                            "O-1": {"id": "U", "value": 40}
                        }
                    }
                }
            }]),
            expected_rows: vec![(vec!["HF", "existentStock", "O-1"], Some(40), Some("U"))],
        },
    ]
}

#[test]
fn test_golden_flatten() {
    for case in get_golden_cases() {
        let tree = section_tree_from_json(case.category, &case.nested.to_string())
            .unwrap_or_else(|e| panic!("{}: parse failed: {}", case.id, e));
        let cells = flatten(case.category, &tree, "req-1").unwrap();

        let rows: Vec<_> = cells
            .iter()
            .map(|c| {
                (
                    c.key_path.iter().map(String::as_str).collect::<Vec<_>>(),
                    c.value,
                    c.id.as_deref(),
                )
            })
            .collect();
        assert_eq!(rows, case.expected_rows, "{}: flat rows", case.id);
        assert!(cells.iter().all(|c| c.category == case.category && c.source_id.is_none()));
    }
}

/// Remove a descriptor unflatten attached, checking it against the lookup
/// table entry for `id`.
fn take_descriptor(holder: &mut Value, field: &str, kind: ReferenceKind, id: &str, lookups: &LookupTables) {
    let descriptor = holder
        .as_object_mut()
        .and_then(|object| object.remove(field))
        .unwrap_or_else(|| panic!("no {} descriptor for {}", field, id));
    let expected = serde_json::to_value(lookups.resolve(kind, id).unwrap()).unwrap();
    assert_eq!(descriptor, expected, "descriptor for {}", id);
}

/// Strip resolved descriptors so the rebuilt JSON compares against the
/// caller's input.
fn strip_descriptors(category: Category, rebuilt: &mut Value, lookups: &LookupTables) {
    match category {
        Category::Regimen => {
            for line in rebuilt.as_array_mut().unwrap() {
                let id = line["regimenId"].as_str().unwrap().to_string();
                take_descriptor(line, "regimen", ReferenceKind::Regimen, &id, lookups);
            }
        }
        Category::UsageInformation => {
            for line in rebuilt.as_array_mut().unwrap() {
                for info in line["informations"].as_object_mut().unwrap().values_mut() {
                    for (id, usage) in info["orderables"].as_object_mut().unwrap().iter_mut() {
                        take_descriptor(usage, "orderable", ReferenceKind::Orderable, id, lookups);
                    }
                }
            }
        }
        _ => {}
    }
}

#[test]
fn test_golden_unflatten_reproduces_nested() {
    let lookups = lookups();
    for case in get_golden_cases() {
        let tree = section_tree_from_json(case.category, &case.nested.to_string()).unwrap();
        let cells = flatten(case.category, &tree, "req-1").unwrap();

        let rebuilt = unflatten(case.category, &cells, &lookups, LeafIdentity::Own).unwrap();
        let mut json: Value =
            serde_json::from_str(&section_json_from_tree(case.category, &rebuilt).unwrap()).unwrap();
        strip_descriptors(case.category, &mut json, &lookups);
        assert_eq!(json, case.nested, "{}: nested form", case.id);
    }
}

#[test]
fn test_null_containers_produce_no_rows() {
    let cases = [
        (Category::Patient, json!({"a": null, "b": {"x": {"value": 1}}})),
        (Category::Patient, json!({"g": {"a": null, "b": {"value": 1}}})),
        (Category::Regimen, json!([{"regimenId": "R", "columns": {"community": null}}])),
        (Category::TestConsumption, json!([{"service": "HF", "projects": null}])),
        (Category::TestConsumption, json!([{"service": "HF", "projects": {"p": null}}])),
        (Category::KitUsage, json!([{"collection": null, "services": {"HF": {"value": 1}}}])),
        (Category::UsageInformation, json!([{"service": null, "informations": {}}])),
    ];
    let expected = [1, 1, 0, 0, 0, 0, 0];

    for ((category, nested), expected) in cases.into_iter().zip(expected) {
        let tree = section_tree_from_json(category, &nested.to_string()).unwrap();
        let cells = flatten(category, &tree, "req-1").unwrap();
        assert_eq!(cells.len(), expected, "{}: {}", category, nested);
    }
}

#[test]
fn test_regimen_without_id_is_rejected() {
    let nested = json!([{"regimenId": null, "columns": {"community": {"value": 6}}}]);
    let result = section_tree_from_json(Category::Regimen, &nested.to_string());
    assert!(matches!(result, Err(PivotError::MissingGroupKey { category: Category::Regimen })));
}

#[test]
fn test_unknown_regimen_fails_unflatten() {
    let nested = json!([{"regimenId": "R-404", "columns": {"community": {"value": 6}}}]);
    let tree = section_tree_from_json(Category::Regimen, &nested.to_string()).unwrap();
    let cells = flatten(Category::Regimen, &tree, "req-1").unwrap();

    let result = unflatten(Category::Regimen, &cells, &lookups(), LeafIdentity::Own);
    match result {
        Err(PivotError::MissingForeignReference { id, .. }) => assert_eq!(id, "R-404"),
        other => panic!("expected missing reference, got {:?}", other),
    }
}

#[test]
fn test_disabled_kit_usage_assembles_empty() {
    let report = UsageReport {
        kit_usage: Some(KitUsageSection {
            lines: vec![KitUsageLine {
                collection: Some("kitReceived".into()),
                services: Some(
                    [("HF".to_string(), Some(UsageValue::new(Some("K1".into()), Some(10))))]
                        .into_iter()
                        .collect(),
                ),
            }],
        }),
        ..Default::default()
    };
    let gates = FeatureGates::all_enabled().with(Category::KitUsage, false);
    let draft = DraftAssembler::new("req-1", "fac-1", gates)
        .assemble(&report)
        .unwrap();

    let section = draft.section(Category::KitUsage).unwrap();
    assert!(section.cells.is_empty());
    assert_eq!(section.state, SectionState::Disabled);
}
