/// Schema Report Module
///
/// Structures describing a collection or table as reported by the backend:
/// declared column metadata for relational databases, or a shape inferred
/// from sampled documents for the document store.

use crate::core::Backend;
use serde::Serialize;

/// Number of documents sampled when inferring a collection's shape.
pub const SAMPLE_SIZE: i64 = 100;

/// Represents a field or column with its metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    /// Field or column name
    pub name: String,
    /// Declared column type, or the type name of the first value seen
    pub type_name: String,
    /// Whether the field may be NULL or absent
    pub nullable: bool,
    /// Whether this field is (part of) the primary key
    pub primary_key: bool,
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSchema {
    /// Index name
    pub name: String,
    /// Field names that make up this index, in key order
    pub columns: Vec<String>,
    /// Whether this is a UNIQUE index
    pub unique: bool,
}

/// Schema report for one collection or table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaReport {
    pub collection: String,
    pub backend: Backend,
    pub fields: Vec<FieldSchema>,
    pub indexes: Vec<IndexSchema>,
    /// Number of documents the fields were inferred from (document store only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampled_documents: Option<usize>,
}

impl SchemaReport {
    /// Renders the report as an indented tree.
    pub fn render(&self) -> String {
        let mut output = String::new();
        let noun = if self.backend.is_relational() { "Table" } else { "Collection" };
        output.push_str(&format!("{}: {} ({})\n", noun, self.collection, self.backend));
        if let Some(sampled) = self.sampled_documents {
            output.push_str(&format!("  Sampled Documents: {}\n", sampled));
        }

        output.push_str("  Fields:\n");
        for field in &self.fields {
            let mut flags = Vec::new();
            if field.primary_key {
                flags.push("primary key");
            }
            if !field.nullable {
                flags.push("not null");
            }
            if flags.is_empty() {
                output.push_str(&format!("    {}: {}\n", field.name, field.type_name));
            } else {
                output.push_str(&format!(
                    "    {}: {} [{}]\n",
                    field.name,
                    field.type_name,
                    flags.join(", ")
                ));
            }
        }

        if self.indexes.is_empty() {
            output.push_str("  Indexes: none\n");
        } else {
            output.push_str("  Indexes:\n");
            for index in &self.indexes {
                let unique = if index.unique { " unique" } else { "" };
                output.push_str(&format!(
                    "    - {} ({}){}\n",
                    index.name,
                    index.columns.join(", "),
                    unique
                ));
            }
        }
        output
    }
}

/// Accumulates field observations across sampled documents.
///
/// A field's type is the type of the first non-null value seen. A field is
/// nullable when some sampled document lacks it or holds null.
#[derive(Debug, Default)]
pub struct FieldSampler {
    documents: usize,
    fields: Vec<SampledField>,
}

#[derive(Debug)]
struct SampledField {
    name: String,
    type_name: Option<String>,
    present: usize,
    saw_null: bool,
}

impl FieldSampler {
    pub fn new() -> Self {
        FieldSampler::default()
    }

    /// Records one document as `(field name, type name)` pairs, with `None`
    /// standing for a null value.
    pub fn observe<'a, I>(&mut self, document: I)
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        self.documents += 1;
        for (name, type_name) in document {
            let index = match self.fields.iter().position(|f| f.name == name) {
                Some(index) => index,
                None => {
                    self.fields.push(SampledField {
                        name: name.to_string(),
                        type_name: None,
                        present: 0,
                        saw_null: false,
                    });
                    self.fields.len() - 1
                }
            };
            let field = &mut self.fields[index];
            field.present += 1;
            match type_name {
                Some(t) if field.type_name.is_none() => field.type_name = Some(t.to_string()),
                Some(_) => {}
                None => field.saw_null = true,
            }
        }
    }

    /// Number of documents observed so far.
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Produces the inferred fields; `primary_key` names the identity field.
    pub fn finish(self, primary_key: &str) -> Vec<FieldSchema> {
        let documents = self.documents;
        self.fields
            .into_iter()
            .map(|f| FieldSchema {
                primary_key: f.name == primary_key,
                nullable: f.saw_null || f.present < documents,
                type_name: f.type_name.unwrap_or_else(|| "null".to_string()),
                name: f.name,
            })
            .collect()
    }
}
