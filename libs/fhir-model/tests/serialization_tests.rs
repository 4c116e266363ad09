mod test_support;

use opal_model::{
    CodeVariant, DictOptions, Error, ExcludeSpec, FieldDescriptor, FieldType, JsonOptions, Record,
    RecordSchema, SchemaRegistry, Value, YamlOptions,
};
use serde_json::{json, Value as JsonValue};
use test_support::{config_with, registry};

fn sample_patient_input() -> JsonValue {
    json!({
        "resourceType": "Patient",
        "id": "pat-1",
        "active": true,
        "name": [{"use": "official", "family": "Everyman", "given": ["Adam", "A."]}],
        "gender": "male",
        "birthDate": "1974-12-25",
        "_birthDate": {"id": "bd"},
        "deceasedBoolean": false,
        "multipleBirthInteger": 2
    })
}

#[test]
fn spec_example_patient() {
    let registry = registry();
    let record = registry
        .construct("Patient", json!({"resourceType": "Patient", "active": true}))
        .expect("constructs");

    let mapping = record.dict(&DictOptions::default());
    assert_eq!(
        JsonValue::Object(mapping),
        json!({"resourceType": "Patient", "active": true})
    );
}

#[test]
fn resource_tag_is_first_key() {
    let registry = registry();
    let record = registry
        .construct("Patient", sample_patient_input())
        .expect("constructs");

    for options in [
        DictOptions::default(),
        DictOptions {
            by_alias: false,
            exclude_none: false,
            exclude_comments: false,
        },
    ] {
        let mapping = record.dict(&options);
        assert_eq!(
            mapping.keys().next().map(String::as_str),
            Some("resourceType")
        );
    }
}

#[test]
fn embedded_structures_never_emit_tag() {
    let registry = registry();
    let name = registry.resolve("HumanName").expect("registered");
    let record = Record::parse_value(&name, &registry, json!({"family": "Everyman"}))
        .expect("constructs");

    for exclude_none in [true, false] {
        let mapping = record.dict(&DictOptions {
            exclude_none,
            ..DictOptions::default()
        });
        assert!(!mapping.contains_key("resourceType"));
    }
}

#[test]
fn declared_order_drives_wire_order() {
    let registry = registry();
    let record = registry
        .construct("Patient", sample_patient_input())
        .expect("constructs");

    let mapping = record.dict(&DictOptions::default());
    let keys: Vec<&str> = mapping.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        [
            "resourceType",
            "id",
            "active",
            "name",
            "gender",
            "birthDate",
            "_birthDate",
            "deceasedBoolean",
            "multipleBirthInteger",
        ]
    );
}

#[test]
fn text_form_round_trips_against_mapping_form() {
    let registry = registry();
    let record = registry
        .construct("Patient", sample_patient_input())
        .expect("constructs");

    for by_alias in [true, false] {
        for exclude_none in [true, false] {
            let text = record
                .json(&JsonOptions {
                    by_alias: Some(by_alias),
                    exclude_none: Some(exclude_none),
                    ..JsonOptions::default()
                })
                .expect("encodes");
            let decoded: JsonValue = serde_json::from_str(&text).expect("decodes");
            let mapping = record.dict(&DictOptions {
                by_alias,
                exclude_none,
                exclude_comments: false,
            });
            assert_eq!(decoded, JsonValue::Object(mapping), "by_alias={by_alias}, exclude_none={exclude_none}");
        }
    }
}

#[test]
fn mapping_form_reconstructs_the_record() {
    let registry = registry();
    let patient = registry.resolve("Patient").expect("registered");
    let record = registry
        .construct("Patient", sample_patient_input())
        .expect("constructs");

    let mapping = record.dict(&DictOptions::default());
    let rebuilt = Record::parse_value(&patient, &registry, JsonValue::Object(mapping))
        .expect("reconstructs");
    assert_eq!(rebuilt, record);
}

#[test]
fn empty_containers_are_omitted() {
    let registry = registry();
    let record = registry
        .construct("Patient", json!({"name": [], "active": null}))
        .expect("constructs");

    // exclude_none on: the empty list vanishes entirely
    let mapping = record.dict(&DictOptions::default());
    assert_eq!(JsonValue::Object(mapping), json!({"resourceType": "Patient"}));

    // exclude_none off: explicit null retained, empty list still omitted
    let mapping = record.dict(&DictOptions {
        exclude_none: false,
        ..DictOptions::default()
    });
    assert!(!mapping.contains_key("name"));
    assert_eq!(mapping.get("active"), Some(&JsonValue::Null));
}

#[test]
fn comments_emit_last_unless_excluded() {
    let registry = registry();
    let record = registry
        .construct(
            "Patient",
            json!({"active": true, "fhir_comments": ["checked 2024-02-01"]}),
        )
        .expect("constructs");

    let mapping = record.dict(&DictOptions::default());
    assert_eq!(
        mapping.keys().last().map(String::as_str),
        Some("fhir_comments")
    );

    let mapping = record.dict(&DictOptions {
        exclude_comments: true,
        ..DictOptions::default()
    });
    assert!(!mapping.contains_key("fhir_comments"));
}

#[test]
fn comment_stripping_reaches_every_depth() {
    let registry = registry();
    let record = registry
        .construct(
            "Patient",
            json!({
                "fhir_comments": "top",
                "active": true,
                "name": [{"family": "Everyman", "fhir_comments": ["nested"]}]
            }),
        )
        .expect("constructs");

    let text = record
        .json(&JsonOptions {
            exclude_comments: true,
            ..JsonOptions::default()
        })
        .expect("encodes");
    assert!(!text.contains("fhir_comments"));
    assert!(text.contains("Everyman"));

    // requesting the same through an exclusion set is equivalent
    let text = record
        .json(&JsonOptions {
            exclude: Some(ExcludeSpec::names(["fhir_comments"])),
            ..JsonOptions::default()
        })
        .expect("encodes");
    assert!(!text.contains("fhir_comments"));
}

#[test]
fn containers_hollowed_by_stripping_are_pruned() {
    let registry = registry();
    let record = registry
        .construct(
            "Patient",
            json!({
                "active": true,
                "name": [{"fhir_comments": "only a comment"}]
            }),
        )
        .expect("constructs");

    let text = record
        .json(&JsonOptions {
            exclude_comments: true,
            ..JsonOptions::default()
        })
        .expect("encodes");
    let decoded: JsonValue = serde_json::from_str(&text).expect("decodes");

    assert!(!text.contains("fhir_comments"));
    // the name entry collapsed to a placeholder, not an empty object
    assert_eq!(decoded["name"], json!([null]));
}

#[test]
fn extension_companion_emitted_under_its_alias() {
    let registry = registry();

    // alongside its primitive
    let record = registry
        .construct(
            "Patient",
            json!({"birthDate": "1974-12-25", "_birthDate": {"id": "bd"}}),
        )
        .expect("constructs");
    let mapping = record.dict(&DictOptions::default());
    assert_eq!(mapping["birthDate"], json!("1974-12-25"));
    assert_eq!(mapping["_birthDate"], json!({"id": "bd"}));

    // and on its own, when the primitive itself is absent
    let record = registry
        .construct("Patient", json!({"_birthDate": {"id": "bd"}}))
        .expect("constructs");
    let mapping = record.dict(&DictOptions::default());
    assert!(!mapping.contains_key("birthDate"));
    assert_eq!(mapping["_birthDate"], json!({"id": "bd"}));

    // internal names when aliases are off
    let mapping = record.dict(&DictOptions {
        by_alias: false,
        ..DictOptions::default()
    });
    assert_eq!(mapping["birthDate__ext"], json!({"id": "bd"}));
}

#[test]
fn empty_extension_not_emitted() {
    let registry = registry();
    let record = registry
        .construct("Patient", json!({"birthDate": "1974-12-25", "_birthDate": {}}))
        .expect("constructs");

    for exclude_none in [true, false] {
        let mapping = record.dict(&DictOptions {
            exclude_none,
            ..DictOptions::default()
        });
        assert!(!mapping.contains_key("_birthDate"));
    }
}

#[test]
fn wrapped_scalar_unwraps() {
    let registry = registry();
    let record = registry
        .construct(
            "Observation",
            json!({
                "status": "final",
                "text": {"status": "generated", "div": "<div>ok</div>"}
            }),
        )
        .expect("constructs");

    let mapping = record.dict(&DictOptions::default());
    assert_eq!(mapping["text"]["div"], json!("<div>ok</div>"));
}

#[test]
fn enum_tokens_and_values() {
    let registry = SchemaRegistry::new();
    let variants = vec![
        CodeVariant::new("Male", "male"),
        CodeVariant::new("Female", "female"),
    ];

    let tokens = registry
        .register(
            RecordSchema::builder("GenderByToken")
                .field(FieldDescriptor::new("gender", FieldType::Code(Some(variants.clone()))))
                .build()
                .expect("builds"),
        )
        .expect("registers");
    let values = registry
        .register(
            RecordSchema::builder("GenderByValue")
                .config(config_with(|c| c.use_enum_values = true))
                .field(FieldDescriptor::new("gender", FieldType::Code(Some(variants))))
                .build()
                .expect("builds"),
        )
        .expect("registers");

    let by_token = Record::parse_value(&tokens, &registry, json!({"gender": "male"}))
        .expect("constructs");
    assert_eq!(by_token.dict(&DictOptions::default())["gender"], json!("Male"));

    let by_value = Record::parse_value(&values, &registry, json!({"gender": "male"}))
        .expect("constructs");
    assert_eq!(by_value.dict(&DictOptions::default())["gender"], json!("male"));

    // a custom conversion callback takes over for values the encoder does
    // not natively understand
    let text = by_token
        .json(&JsonOptions {
            encoder: Some(|value| match value {
                Value::Enum(e) => json!(format!("token:{}", e.variant)),
                other => json!(format!("{other:?}")),
            }),
            ..JsonOptions::default()
        })
        .expect("encodes");
    assert!(text.contains("token:Male"));
}

#[test]
fn decimals_render_as_numbers() {
    let registry = registry();
    let record = registry
        .construct("Observation", json!({"status": "final", "valueQuantity": 185.5}))
        .expect("constructs");

    let mapping = record.dict(&DictOptions::default());
    assert_eq!(mapping["valueQuantity"], json!(185.5));
}

#[test]
fn json_encode_options() {
    let registry = registry();
    let record = registry
        .construct("Patient", json!({"active": true, "id": "x"}))
        .expect("constructs");

    let compact = record.json(&JsonOptions::default()).expect("encodes");
    assert!(!compact.contains('\n'));

    let pretty = record
        .json(&JsonOptions {
            encode: opal_format::EncodeOptions::indented(),
            ..JsonOptions::default()
        })
        .expect("encodes");
    assert!(pretty.contains("\n  \"active\""));

    let sorted = record
        .json(&JsonOptions {
            encode: opal_format::EncodeOptions {
                sort_keys: true,
                ..opal_format::EncodeOptions::default()
            },
            ..JsonOptions::default()
        })
        .expect("encodes");
    assert!(sorted.starts_with(r#"{"active""#));

    let bytes = record.json_bytes(&JsonOptions::default()).expect("encodes");
    assert_eq!(bytes, compact.as_bytes());
}

#[test]
fn exclude_spec_from_dynamic_configuration() {
    assert!(ExcludeSpec::from_value(&json!(["fhir_comments", "active"])).is_ok());
    assert!(ExcludeSpec::from_value(&json!({"name": {"__all__": {"family": true}}})).is_ok());

    for bad in [json!(5), json!("fhir_comments"), json!(["a", 5]), json!({"a": 5})] {
        let err = ExcludeSpec::from_value(&bad).unwrap_err();
        assert!(matches!(err, Error::UnsupportedExclude(_)), "{bad}");
    }
}

#[test]
fn exclude_spec_filters_output() {
    let registry = registry();
    let record = registry
        .construct("Patient", sample_patient_input())
        .expect("constructs");

    let spec = ExcludeSpec::from_value(&json!({
        "active": true,
        "name": {"__all__": {"given": true}}
    }))
    .expect("parses");

    let text = record
        .json(&JsonOptions {
            exclude: Some(spec),
            ..JsonOptions::default()
        })
        .expect("encodes");
    let decoded: JsonValue = serde_json::from_str(&text).expect("decodes");

    assert!(decoded.get("active").is_none());
    assert!(decoded["name"][0].get("given").is_none());
    assert_eq!(decoded["name"][0]["family"], json!("Everyman"));
}

#[test]
fn yaml_form_matches_mapping_semantics() {
    let registry = registry();
    let record = registry
        .construct("Patient", sample_patient_input())
        .expect("constructs");

    let mapping = record.yaml_dict(&YamlOptions::default());
    assert_eq!(
        mapping.keys().next().map(String::as_str),
        Some("resourceType")
    );

    let text = record.yaml(&YamlOptions::default()).expect("encodes");
    let decoded = opal_format::yaml_loads(&text).expect("decodes");
    assert_eq!(
        decoded,
        JsonValue::Object(record.dict(&DictOptions::default()))
    );

    // non-resources never gain a tag through the yaml path either
    let name = registry.resolve("HumanName").expect("registered");
    let embedded = Record::parse_value(&name, &registry, json!({"family": "Everyman"}))
        .expect("constructs");
    let mapping = embedded.yaml_dict(&YamlOptions::default());
    assert!(!mapping.contains_key("resourceType"));
}

#[test]
fn yaml_exclude_set_strips_comments_at_depth() {
    let registry = registry();
    let record = registry
        .construct(
            "Patient",
            json!({
                "active": true,
                "name": [{"family": "Everyman", "fhir_comments": "nested"}]
            }),
        )
        .expect("constructs");

    let mapping = record.yaml_dict(&YamlOptions {
        exclude: Some(ExcludeSpec::names(["fhir_comments"])),
        ..YamlOptions::default()
    });
    let rendered = JsonValue::Object(mapping).to_string();
    assert!(!rendered.contains("fhir_comments"));
}

#[test]
fn xml_form_renders_the_mapping() {
    let registry = registry();
    let record = registry
        .construct("Patient", sample_patient_input())
        .expect("constructs");

    let xml = record.xml().expect("encodes");
    assert!(xml.contains("<Patient"));
    assert!(xml.contains(r#"<active value="true"/>"#));
    assert!(xml.contains(r#"<given value="Adam"/>"#));
    assert!(xml.contains(r#"<birthDate value="1974-12-25" id="bd"/>"#));
}

#[test]
fn serde_serialize_uses_default_mapping_form() {
    let registry = registry();
    let record = registry
        .construct("Patient", sample_patient_input())
        .expect("constructs");

    let via_serde = serde_json::to_value(&record).expect("serializes");
    assert_eq!(
        via_serde,
        JsonValue::Object(record.dict(&DictOptions::default()))
    );
}
