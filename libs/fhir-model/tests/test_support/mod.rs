//! Shared schema fixtures: a small but representative slice of the R4
//! resource tree, built the way generated definitions would build it.

use opal_model::{
    CodeVariant, FieldDescriptor, FieldType, ModelConfig, RecordSchema, SchemaRegistry,
    ROOT_FIELD,
};
use std::sync::Arc;

pub fn registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::new();

    let resource = registry
        .register(
            RecordSchema::builder("Resource")
                .namespace("fhir.r4")
                .field(FieldDescriptor::new("id", FieldType::String))
                .field(FieldDescriptor::new("implicitRules", FieldType::Uri))
                .field(FieldDescriptor::new("language", FieldType::Code(None)))
                .build()
                .expect("Resource schema builds"),
        )
        .expect("Resource registers");

    let domain_resource = registry
        .register(
            RecordSchema::builder("DomainResource")
                .namespace("fhir.r4")
                .base(resource)
                .build()
                .expect("DomainResource schema builds"),
        )
        .expect("DomainResource registers");

    registry
        .register(
            RecordSchema::builder("Xhtml")
                .namespace("fhir.r4")
                .field(FieldDescriptor::new(ROOT_FIELD, FieldType::String))
                .build()
                .expect("Xhtml schema builds"),
        )
        .expect("Xhtml registers");

    registry
        .register(
            RecordSchema::builder("Narrative")
                .namespace("fhir.r4")
                .field(FieldDescriptor::new("status", FieldType::Code(None)).required())
                .field(FieldDescriptor::new("div", FieldType::Record("Xhtml".to_string())))
                .build()
                .expect("Narrative schema builds"),
        )
        .expect("Narrative registers");

    registry
        .register(
            RecordSchema::builder("HumanName")
                .namespace("fhir.r4")
                .field(FieldDescriptor::new("use", FieldType::Code(None)))
                .primitive_with_extension(FieldDescriptor::new("family", FieldType::String))
                .primitive_with_extension(FieldDescriptor::new(
                    "given",
                    FieldType::List(Box::new(FieldType::String)),
                ))
                .build()
                .expect("HumanName schema builds"),
        )
        .expect("HumanName registers");

    registry
        .register(
            RecordSchema::builder("Patient")
                .namespace("fhir.r4")
                .base(domain_resource.clone())
                .field(FieldDescriptor::new("active", FieldType::Boolean))
                .field(FieldDescriptor::new(
                    "name",
                    FieldType::List(Box::new(FieldType::Record("HumanName".to_string()))),
                ))
                .field(FieldDescriptor::new(
                    "gender",
                    FieldType::Code(Some(vec![
                        CodeVariant::new("male", "male"),
                        CodeVariant::new("female", "female"),
                        CodeVariant::new("other", "other"),
                        CodeVariant::new("unknown", "unknown"),
                    ])),
                ))
                .primitive_with_extension(FieldDescriptor::new("birthDate", FieldType::Date))
                .field(
                    FieldDescriptor::new("deceased_boolean", FieldType::Boolean)
                        .alias("deceasedBoolean"),
                )
                .field(
                    FieldDescriptor::new("multiple_birth_integer", FieldType::Integer)
                        .alias("multipleBirthInteger"),
                )
                .build()
                .expect("Patient schema builds"),
        )
        .expect("Patient registers");

    registry
        .register(
            RecordSchema::builder("Observation")
                .namespace("fhir.r4")
                .base(domain_resource)
                .field(FieldDescriptor::new("status", FieldType::Code(None)).required())
                .field(FieldDescriptor::new("text", FieldType::Record("Narrative".to_string())))
                .field(FieldDescriptor::new("value_string", FieldType::String).alias("valueString"))
                .field(
                    FieldDescriptor::new("value_quantity", FieldType::Decimal)
                        .alias("valueQuantity"),
                )
                .build()
                .expect("Observation schema builds"),
        )
        .expect("Observation registers");

    registry
}

/// A config tweak helper for types registered outside the default set.
pub fn config_with(f: impl FnOnce(&mut ModelConfig)) -> ModelConfig {
    let mut config = ModelConfig::default();
    f(&mut config);
    config
}
