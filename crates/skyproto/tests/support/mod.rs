//! Shared test schema
//!
//! Builds a small descriptor pool in code, without protoc: a proto3 file
//! with messages, enums, oneofs, maps, and a service, plus a proto2 file
//! with a required field.

use once_cell::sync::Lazy;
use prost_reflect::DescriptorPool;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions, MethodDescriptorProto,
    OneofDescriptorProto, ServiceDescriptorProto,
};
use skyproto::{MessageProxy, ProtoLibrary};

// Descriptor identity is pool identity, so every suite shares one pool
static POOL: Lazy<DescriptorPool> = Lazy::new(|| {
    DescriptorPool::from_file_descriptor_set(file_set()).expect("test schema is valid")
});

fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        r#type: Some(ty as i32),
        label: Some(label as i32),
        ..Default::default()
    }
}

fn typed_field(
    name: &str,
    number: i32,
    ty: Type,
    label: Label,
    type_name: &str,
) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, ty, label)
    }
}

fn oneof_field(name: &str, number: i32, ty: Type, index: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        oneof_index: Some(index),
        ..field(name, number, ty, Label::Optional)
    }
}

fn enum_value(name: &str, number: i32) -> EnumValueDescriptorProto {
    EnumValueDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        ..Default::default()
    }
}

fn map_entry(name: &str, key: FieldDescriptorProto, value: FieldDescriptorProto) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![key, value],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn library_file() -> FileDescriptorProto {
    let author = DescriptorProto {
        name: Some("Author".to_string()),
        field: vec![
            field("name", 1, Type::String, Label::Optional),
            field("year", 2, Type::Int32, Label::Optional),
        ],
        ..Default::default()
    };

    let book = DescriptorProto {
        name: Some("Book".to_string()),
        field: vec![
            field("title", 1, Type::String, Label::Optional),
            field("tags", 2, Type::String, Label::Repeated),
            typed_field("author", 3, Type::Message, Label::Optional, ".library.Author"),
            typed_field(
                "ratings",
                4,
                Type::Message,
                Label::Repeated,
                ".library.Book.RatingsEntry",
            ),
            oneof_field("isbn", 5, Type::String, 0),
            oneof_field("code", 6, Type::Int64, 0),
            typed_field("color", 7, Type::Enum, Label::Optional, ".library.Color"),
            typed_field("authors", 8, Type::Message, Label::Repeated, ".library.Author"),
            typed_field(
                "chapters",
                9,
                Type::Message,
                Label::Repeated,
                ".library.Book.ChaptersEntry",
            ),
            field("cover", 10, Type::Bytes, Label::Optional),
            field("weight", 11, Type::Double, Label::Optional),
            field("pages", 12, Type::Uint32, Label::Optional),
            field("serial", 13, Type::Uint64, Label::Optional),
            field("words", 14, Type::Int64, Label::Optional),
            field("score", 15, Type::Float, Label::Optional),
            field("in_print", 16, Type::Bool, Label::Optional),
        ],
        nested_type: vec![
            map_entry(
                "RatingsEntry",
                field("key", 1, Type::String, Label::Optional),
                field("value", 2, Type::Int32, Label::Optional),
            ),
            map_entry(
                "ChaptersEntry",
                field("key", 1, Type::Int32, Label::Optional),
                typed_field("value", 2, Type::Message, Label::Optional, ".library.Author"),
            ),
        ],
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("id".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let color = EnumDescriptorProto {
        name: Some("Color".to_string()),
        value: vec![
            enum_value("COLOR_UNSPECIFIED", 0),
            enum_value("RED", 1),
            enum_value("BLUE", 2),
        ],
        ..Default::default()
    };

    let shade = EnumDescriptorProto {
        name: Some("Shade".to_string()),
        value: vec![enum_value("SHADE_UNSPECIFIED", 0), enum_value("DARK", 1)],
        ..Default::default()
    };

    let shelf = ServiceDescriptorProto {
        name: Some("Shelf".to_string()),
        method: vec![MethodDescriptorProto {
            name: Some("GetBook".to_string()),
            input_type: Some(".library.Book".to_string()),
            output_type: Some(".library.Book".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("library.proto".to_string()),
        package: Some("library".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![author, book],
        enum_type: vec![color, shade],
        service: vec![shelf],
        ..Default::default()
    }
}

fn legacy_file() -> FileDescriptorProto {
    let record = DescriptorProto {
        name: Some("Legacy".to_string()),
        field: vec![
            field("id", 1, Type::String, Label::Required),
            field("count", 2, Type::Int32, Label::Optional),
        ],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("legacy.proto".to_string()),
        package: Some("legacy".to_string()),
        syntax: Some("proto2".to_string()),
        message_type: vec![record],
        ..Default::default()
    }
}

/// The shared descriptor set used by the integration suites
pub fn file_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![library_file(), legacy_file()],
    }
}

/// A library over the shared descriptor pool
pub fn library() -> ProtoLibrary {
    ProtoLibrary::from_pool(POOL.clone())
}

/// A fresh zero-valued message of the given full name
pub fn new_message(library: &ProtoLibrary, full_name: &str) -> MessageProxy {
    let message = library
        .pool()
        .get_message_by_name(full_name)
        .expect("message type exists in the test schema");
    MessageProxy::new(message)
}
