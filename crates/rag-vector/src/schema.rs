use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

/// Documents table: one row per knowledge document, with its embedding.
pub fn build_documents_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("seq", DataType::Int64, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("category", DataType::Utf8, false),
		Field::new("topic", DataType::Utf8, false),
		Field::new("severity", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("extra_json", DataType::Utf8, true),
		Field::new("added_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}

/// Width of the `vector` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<i32> {
	match schema.field_with_name("vector").ok()?.data_type() {
		DataType::FixedSizeList(_, n) => Some(*n),
		_ => None,
	}
}
