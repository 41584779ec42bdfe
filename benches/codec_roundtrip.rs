//! Benchmark: build, parse, and printable walks over a representative
//! response with counted strings, a struct array, and a referenced byte
//! array.

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uuid::Uuid;
use wirecmd::builder::build_response;
use wirecmd::{
    FieldFormat, FieldSelection, FieldSpec, Message, MessageCodec, MessageVariant, Schema,
    StructDef, StructValue, Value, VariantKind,
};

fn bench_codec(c: &mut Criterion) {
    let mut schema = Schema::new();
    schema
        .add_struct(StructDef {
            name: "Context".to_string(),
            fields: vec![
                FieldSpec::new("ContextId", FieldFormat::Uint32),
                FieldSpec::new("ContextType", FieldFormat::Uint32),
            ],
        })
        .expect("unique struct name");

    let service = Uuid::from_bytes([0x7e; 16]);
    let message = Message::new(service, 13, "ProvisionedContexts").with_response(
        MessageVariant::new(
            "1.0",
            vec![
                FieldSpec::new("ItemCount", FieldFormat::Uint32),
                FieldSpec::new("AccessStrings", FieldFormat::StringArray)
                    .with_array_size_field("ItemCount"),
                FieldSpec::new("ContextCount", FieldFormat::Uint32),
                FieldSpec::new("Contexts", FieldFormat::StructArray)
                    .with_struct_type("Context")
                    .with_array_size_field("ContextCount"),
                FieldSpec::new("RawConfig", FieldFormat::RefByteArray),
            ],
        ),
    );
    let codec = MessageCodec::new(&message, &schema).expect("valid schema");

    let mut values: HashMap<String, Value> = HashMap::new();
    values.insert("ItemCount".to_string(), Value::U32(4));
    values.insert(
        "AccessStrings".to_string(),
        Value::StrArray(vec![
            "internet".to_string(),
            "ims".to_string(),
            "mms".to_string(),
            "supl".to_string(),
        ]),
    );
    values.insert("ContextCount".to_string(), Value::U32(8));
    values.insert(
        "Contexts".to_string(),
        Value::StructArray(
            (0..8)
                .map(|i| {
                    let mut m = StructValue::new();
                    m.insert("ContextId".to_string(), Value::U32(i));
                    m.insert("ContextType".to_string(), Value::U32(i % 3));
                    m
                })
                .collect(),
        ),
    );
    values.insert("RawConfig".to_string(), Value::Bytes(vec![0xa5; 64]));

    let raw = build_response(codec.message(), codec.schema(), 1, 0, &values)
        .expect("build response");

    c.bench_function("build_response", |b| {
        b.iter(|| {
            build_response(
                codec.message(),
                codec.schema(),
                black_box(1),
                0,
                black_box(&values),
            )
            .expect("build response")
        });
    });

    c.bench_function("parse_response_all", |b| {
        b.iter(|| {
            codec
                .parse(black_box(&raw), VariantKind::Response, FieldSelection::All)
                .expect("parse response")
        });
    });

    c.bench_function("parse_response_selected", |b| {
        b.iter(|| {
            codec
                .parse(
                    black_box(&raw),
                    VariantKind::Response,
                    FieldSelection::Only(&["AccessStrings"]),
                )
                .expect("parse response")
        });
    });

    c.bench_function("printable_response", |b| {
        b.iter(|| codec.printable(black_box(&raw), VariantKind::Response, "  "));
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
