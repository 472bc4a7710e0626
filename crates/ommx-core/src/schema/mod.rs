//! Schema of the `ommx.v1` messages as a protobuf descriptor.
//!
//! The descriptor is assembled with `prost-types` from the same field
//! numbers the codec in [`crate::model`] uses, then resolved with
//! `prost-reflect`. Consumers can use the resolved pool to decode instances
//! reflectively, and [`SchemaPrinter`] renders it as `.proto` source.

mod printer;

pub use printer::{PrinterConfig, SchemaPrinter};

use crate::error::{Error, Result};
use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions, OneofDescriptorProto,
};
use tracing::debug;

/// Protobuf package of every message
pub const PACKAGE: &str = "ommx.v1";

/// Path of the schema file inside a proto source tree
pub const FILE_NAME: &str = "ommx/v1/ommx.proto";

fn type_ref(name: &str) -> String {
    format!(".{}.{}", PACKAGE, name)
}

fn field(name: &str, number: i32, label: Label, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn scalar(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    field(name, number, Label::Optional, ty)
}

fn repeated(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    field(name, number, Label::Repeated, ty)
}

fn typed(name: &str, number: i32, label: Label, ty: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_ref(type_name)),
        ..field(name, number, label, ty)
    }
}

fn message(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    typed(name, number, Label::Optional, Type::Message, type_name)
}

fn repeated_message(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    typed(name, number, Label::Repeated, Type::Message, type_name)
}

fn enumeration(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    typed(name, number, Label::Optional, Type::Enum, type_name)
}

/// Marks `field` as a proto3 `optional` field backed by the synthetic oneof `index`
fn optional(field: FieldDescriptorProto, index: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        oneof_index: Some(index),
        proto3_optional: Some(true),
        ..field
    }
}

/// Synthetic oneof declarations for the given proto3 `optional` fields
fn synthetic_oneofs(fields: &[&str]) -> Vec<OneofDescriptorProto> {
    fields
        .iter()
        .map(|name| OneofDescriptorProto {
            name: Some(format!("_{}", name)),
            ..Default::default()
        })
        .collect()
}

fn map_entry(name: &str, key: Type, value: Type) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![scalar("key", 1, key), scalar("value", 2, value)],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn enum_type(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_string()),
        value: values
            .iter()
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some(name.to_string()),
                number: Some(*number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn message_type(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn linear() -> DescriptorProto {
    DescriptorProto {
        nested_type: vec![message_type(
            "Term",
            vec![scalar("id", 1, Type::Uint64), scalar("coefficient", 2, Type::Double)],
        )],
        ..message_type(
            "Linear",
            vec![
                repeated_message("terms", 1, "Linear.Term"),
                scalar("constant", 2, Type::Double),
            ],
        )
    }
}

fn quadratic() -> DescriptorProto {
    DescriptorProto {
        oneof_decl: synthetic_oneofs(&["linear"]),
        ..message_type(
            "Quadratic",
            vec![
                repeated("rows", 1, Type::Uint64),
                repeated("columns", 2, Type::Uint64),
                repeated("values", 3, Type::Double),
                optional(message("linear", 4, "Linear"), 0),
            ],
        )
    }
}

fn monomial() -> DescriptorProto {
    message_type(
        "Monomial",
        vec![repeated("ids", 1, Type::Uint64), scalar("coefficient", 2, Type::Double)],
    )
}

fn polynomial() -> DescriptorProto {
    message_type("Polynomial", vec![repeated_message("terms", 1, "Monomial")])
}

fn function() -> DescriptorProto {
    let member = |field: FieldDescriptorProto| FieldDescriptorProto {
        oneof_index: Some(0),
        ..field
    };
    DescriptorProto {
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("function".to_string()),
            ..Default::default()
        }],
        ..message_type(
            "Function",
            vec![
                member(scalar("constant", 1, Type::Double)),
                member(message("linear", 2, "Linear")),
                member(message("quadratic", 3, "Quadratic")),
                member(message("polynomial", 4, "Polynomial")),
            ],
        )
    }
}

fn bound() -> DescriptorProto {
    message_type(
        "Bound",
        vec![scalar("lower", 1, Type::Double), scalar("upper", 2, Type::Double)],
    )
}

fn decision_variable() -> DescriptorProto {
    DescriptorProto {
        nested_type: vec![map_entry("ParametersEntry", Type::String, Type::String)],
        enum_type: vec![enum_type(
            "Kind",
            &[
                ("KIND_UNSPECIFIED", 0),
                ("KIND_BINARY", 1),
                ("KIND_INTEGER", 2),
                ("KIND_CONTINUOUS", 3),
                ("KIND_SEMI_INTEGER", 4),
                ("KIND_SEMI_CONTINUOUS", 5),
            ],
        )],
        oneof_decl: synthetic_oneofs(&["bound", "name", "description", "substituted_value"]),
        ..message_type(
            "DecisionVariable",
            vec![
                scalar("id", 1, Type::Uint64),
                enumeration("kind", 2, "DecisionVariable.Kind"),
                optional(message("bound", 3, "Bound"), 0),
                optional(scalar("name", 4, Type::String), 1),
                repeated("subscripts", 5, Type::Int64),
                repeated_message("parameters", 6, "DecisionVariable.ParametersEntry"),
                optional(scalar("description", 7, Type::String), 2),
                optional(scalar("substituted_value", 8, Type::Double), 3),
            ],
        )
    }
}

fn constraint() -> DescriptorProto {
    DescriptorProto {
        nested_type: vec![map_entry("ParametersEntry", Type::String, Type::String)],
        enum_type: vec![enum_type(
            "Equality",
            &[
                ("EQUALITY_UNSPECIFIED", 0),
                ("EQUALITY_EQUAL_TO_ZERO", 1),
                ("EQUALITY_LESS_THAN_OR_EQUAL_TO_ZERO", 2),
            ],
        )],
        oneof_decl: synthetic_oneofs(&["function", "name", "description"]),
        ..message_type(
            "Constraint",
            vec![
                scalar("id", 1, Type::Uint64),
                enumeration("equality", 2, "Constraint.Equality"),
                optional(message("function", 3, "Function"), 0),
                repeated_message("parameters", 5, "Constraint.ParametersEntry"),
                optional(scalar("name", 6, Type::String), 1),
                optional(scalar("description", 7, Type::String), 2),
                repeated("subscripts", 8, Type::Int64),
            ],
        )
    }
}

fn instance() -> DescriptorProto {
    let description = DescriptorProto {
        oneof_decl: synthetic_oneofs(&["name", "description", "created_by"]),
        ..message_type(
            "Description",
            vec![
                optional(scalar("name", 1, Type::String), 0),
                optional(scalar("description", 2, Type::String), 1),
                repeated("authors", 3, Type::String),
                optional(scalar("created_by", 4, Type::String), 2),
            ],
        )
    };
    DescriptorProto {
        nested_type: vec![description],
        enum_type: vec![enum_type(
            "Sense",
            &[("SENSE_UNSPECIFIED", 0), ("SENSE_MINIMIZE", 1), ("SENSE_MAXIMIZE", 2)],
        )],
        oneof_decl: synthetic_oneofs(&["description"]),
        ..message_type(
            "Instance",
            vec![
                optional(message("description", 1, "Instance.Description"), 0),
                repeated_message("decision_variables", 2, "DecisionVariable"),
                message("objective", 3, "Function"),
                repeated_message("constraints", 4, "Constraint"),
                enumeration("sense", 5, "Instance.Sense"),
            ],
        )
    }
}

fn state() -> DescriptorProto {
    DescriptorProto {
        nested_type: vec![map_entry("EntriesEntry", Type::Uint64, Type::Double)],
        ..message_type(
            "State",
            vec![repeated_message("entries", 1, "State.EntriesEntry")],
        )
    }
}

/// Descriptor of `ommx/v1/ommx.proto`
pub fn file_descriptor_proto() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(FILE_NAME.to_string()),
        package: Some(PACKAGE.to_string()),
        message_type: vec![
            linear(),
            quadratic(),
            monomial(),
            polynomial(),
            function(),
            bound(),
            decision_variable(),
            constraint(),
            instance(),
            state(),
        ],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

/// Resolves [`file_descriptor_proto`] into a pool usable for reflection
pub fn descriptor_pool() -> Result<DescriptorPool> {
    let fds = FileDescriptorSet {
        file: vec![file_descriptor_proto()],
    };

    let mut fds_bytes = Vec::new();
    fds.encode(&mut fds_bytes)
        .map_err(|e| Error::descriptor_build(format!("failed to encode descriptor set: {}", e)))?;

    let pool = DescriptorPool::decode(fds_bytes.as_slice())
        .map_err(|e| Error::descriptor_build(format!("failed to decode descriptor pool: {}", e)))?;
    debug!(
        "Built descriptor pool with {} messages",
        pool.all_messages().count()
    );
    Ok(pool)
}

/// `.proto` source of the schema with the default printer settings
pub fn proto_source() -> String {
    SchemaPrinter::new().print(&file_descriptor_proto())
}
