//! Rendering of result rows as JSON instances.
//!
//! Every instance carries `id` and `className`; property members follow in
//! property map order. Points become `{"x","y"[,"z"]}`, navigation values
//! `{"id","relClassName"}`, and array columns are decoded from their stored
//! JSON text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::errors::ReaderError;
use crate::property_map::{PropertyMap, PropertyMapCollection, PropertyMapData};
use crate::schema_catalog::{EcClass, EcClassId, PrimitiveType, PropertyKind, SchemaCatalog};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown option value `{0}`")]
pub struct UnknownOptionValue(pub String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MemberNameCasing {
    #[default]
    KeepOriginal,
    LowerFirstChar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Int64Format {
    #[default]
    AsHexadecimalString,
    AsDecimalString,
    AsNumber,
}

impl FromStr for MemberNameCasing {
    type Err = UnknownOptionValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "keep_original" => Ok(MemberNameCasing::KeepOriginal),
            "lower_first_char" => Ok(MemberNameCasing::LowerFirstChar),
            _ => Err(UnknownOptionValue(s.to_string())),
        }
    }
}

impl FromStr for Int64Format {
    type Err = UnknownOptionValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "as_hexadecimal_string" | "hex" => Ok(Int64Format::AsHexadecimalString),
            "as_decimal_string" | "decimal" => Ok(Int64Format::AsDecimalString),
            "as_number" | "number" => Ok(Int64Format::AsNumber),
            _ => Err(UnknownOptionValue(s.to_string())),
        }
    }
}

impl fmt::Display for Int64Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Int64Format::AsHexadecimalString => "as_hexadecimal_string",
            Int64Format::AsDecimalString => "as_decimal_string",
            Int64Format::AsNumber => "as_number",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    pub member_name_casing: MemberNameCasing,
    pub int64_format: Int64Format,
}

impl FormatOptions {
    pub fn member_name(&self, name: &str) -> String {
        match self.member_name_casing {
            MemberNameCasing::KeepOriginal => name.to_string(),
            MemberNameCasing::LowerFirstChar => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }

    pub fn format_int64(&self, value: u64) -> Value {
        match self.int64_format {
            Int64Format::AsHexadecimalString => Value::String(format!("0x{:x}", value)),
            Int64Format::AsDecimalString => Value::String(value.to_string()),
            Int64Format::AsNumber => Value::from(value),
        }
    }
}

/// Id from a number, a `0x` hex string, or a decimal string.
pub fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
}

pub struct InstanceFormatter<'a> {
    catalog: &'a SchemaCatalog,
    options: &'a FormatOptions,
}

impl<'a> InstanceFormatter<'a> {
    pub fn new(catalog: &'a SchemaCatalog, options: &'a FormatOptions) -> Self {
        InstanceFormatter { catalog, options }
    }

    /// Class named by the row's `ECClassId`, falling back to `selected`.
    pub fn row_class(&self, row: &[Value], selected: &EcClass) -> EcClassId {
        row.get(1)
            .and_then(parse_id)
            .map(EcClassId)
            .filter(|id| self.catalog.get_class(*id).is_ok())
            .unwrap_or(selected.id)
    }

    /// Render one row selected as `ECInstanceId, ECClassId, <maps...>`.
    pub fn format_row(
        &self,
        row: &[Value],
        selected: &EcClass,
        maps: &PropertyMapCollection,
    ) -> Result<Value, ReaderError> {
        let class_name = selected.ecsql_name();
        if row.len() != maps.len() + 2 {
            return Err(ReaderError::malformed(
                &class_name,
                format!("expected {} values, got {}", maps.len() + 2, row.len()),
            ));
        }
        let id = parse_id(&row[0])
            .ok_or_else(|| ReaderError::malformed(&class_name, "ECInstanceId is not an id"))?;
        let row_class = self.catalog.get_class(self.row_class(row, selected))?;

        let mut instance = Map::new();
        instance.insert("id".to_string(), self.options.format_int64(id));
        instance.insert("className".to_string(), Value::String(row_class.ecsql_name()));
        for (map, value) in maps.iter().zip(&row[2..]) {
            if let Some(formatted) = self.format_property(map, value, &class_name)? {
                instance.insert(self.options.member_name(&map.property().name), formatted);
            }
        }
        Ok(Value::Object(instance))
    }

    fn format_property(
        &self,
        map: &PropertyMap,
        value: &Value,
        class_name: &str,
    ) -> Result<Option<Value>, ReaderError> {
        if value.is_null() {
            return Ok(None);
        }
        let malformed = |message: String| {
            ReaderError::malformed(class_name, format!("{}: {}", map.access_string(), message))
        };

        let formatted = match map.data() {
            PropertyMapData::Primitive { .. } => match map.property().kind {
                PropertyKind::Primitive {
                    primitive_type: PrimitiveType::Long,
                } => match value.as_u64() {
                    Some(n) => self.options.format_int64(n),
                    None => value.clone(),
                },
                _ => value.clone(),
            },
            PropertyMapData::Point { is_3d, .. } => {
                let count = if *is_3d { 3 } else { 2 };
                let mut point = Map::new();
                for (index, axis) in ["x", "y", "z"][..count].iter().enumerate() {
                    let coordinate = match value {
                        Value::Array(items) => items.get(index).cloned(),
                        Value::Object(obj) => obj
                            .get(*axis)
                            .or_else(|| obj.get(&axis.to_ascii_uppercase()))
                            .cloned(),
                        _ => None,
                    }
                    .ok_or_else(|| malformed(format!("missing {} coordinate", axis)))?;
                    point.insert(axis.to_string(), coordinate);
                }
                Value::Object(point)
            }
            PropertyMapData::PrimitiveArray { .. } | PropertyMapData::StructArrayJson { .. } => {
                match value {
                    Value::String(text) => serde_json::from_str(text)
                        .map_err(|e| malformed(format!("array column is not JSON: {}", e)))?,
                    Value::Array(_) => value.clone(),
                    _ => return Err(malformed("expected a JSON array".to_string())),
                }
            }
            PropertyMapData::Struct { members } => {
                let Value::Object(fields) = value else {
                    return Err(malformed("expected a struct object".to_string()));
                };
                let mut out = Map::new();
                for member in members.iter() {
                    let name = &member.property().name;
                    let field = fields
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(name))
                        .map(|(_, v)| v);
                    if let Some(field) = field {
                        if let Some(formatted) = self.format_property(member, field, class_name)? {
                            out.insert(self.options.member_name(name), formatted);
                        }
                    }
                }
                Value::Object(out)
            }
            PropertyMapData::Navigation { .. } => {
                let (id, rel_class) = match value {
                    Value::Object(obj) => (
                        obj.get("Id").or_else(|| obj.get("id")).and_then(parse_id),
                        obj.get("RelECClassId")
                            .and_then(parse_id)
                            .and_then(|id| self.catalog.get_class(EcClassId(id)).ok())
                            .map(|c| c.ecsql_name()),
                    ),
                    other => (parse_id(other), None),
                };
                let id = id.ok_or_else(|| malformed("navigation value has no id".to_string()))?;
                let rel_class_name = match rel_class {
                    Some(name) => name,
                    None => {
                        let relationship = map.navigation_relationship().unwrap_or_default();
                        let schema = self.catalog.get_class(map.class_id())?.schema_name.clone();
                        self.catalog
                            .resolve_class(relationship, Some(&schema))?
                            .ecsql_name()
                    }
                };
                let mut nav = Map::new();
                nav.insert("id".to_string(), self.options.format_int64(id));
                nav.insert("relClassName".to_string(), Value::String(rel_class_name));
                Value::Object(nav)
            }
        };
        Ok(Some(formatted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property_map::{DbSchema, SchemaMapper};
    use crate::testing::test_catalog;
    use serde_json::json;

    #[test]
    fn test_member_name_casing() {
        let options = FormatOptions {
            member_name_casing: MemberNameCasing::LowerFirstChar,
            ..Default::default()
        };
        assert_eq!(options.member_name("Name"), "name");
        assert_eq!(options.member_name("ECInstanceId"), "eCInstanceId");
        assert_eq!(options.member_name(""), "");
        assert_eq!(FormatOptions::default().member_name("Name"), "Name");
    }

    #[test]
    fn test_int64_formats() {
        let mut options = FormatOptions::default();
        assert_eq!(options.format_int64(31), json!("0x1f"));
        options.int64_format = Int64Format::AsDecimalString;
        assert_eq!(options.format_int64(31), json!("31"));
        options.int64_format = Int64Format::AsNumber;
        assert_eq!(options.format_int64(31), json!(31));
        assert_eq!("hex".parse::<Int64Format>(), Ok(Int64Format::AsHexadecimalString));
        assert!("octal".parse::<Int64Format>().is_err());
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(&json!(16)), Some(16));
        assert_eq!(parse_id(&json!("0x10")), Some(16));
        assert_eq!(parse_id(&json!("16")), Some(16));
        assert_eq!(parse_id(&json!(null)), None);
    }

    #[test]
    fn test_format_foo_row() {
        let catalog = test_catalog();
        let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
        mapper.map_all().unwrap();
        let foo = catalog.resolve_class("ts:Foo", None).unwrap();
        let maps = mapper.class_map(foo.id).unwrap().property_maps();

        let options = FormatOptions::default();
        let formatter = InstanceFormatter::new(&catalog, &options);
        let row = vec![
            json!(31),
            json!(foo.id.0),
            json!("first"),
            json!(3),
            json!(9_000_000_000u64),
            json!([1.0, 2.0]),
            json!("[\"a\",\"b\"]"),
            json!({"street": "Main", "City": "Exton", "Geo": {"X": 1.5, "Y": 2.5}}),
            json!(null),
        ];
        let instance = formatter.format_row(&row, &foo, maps).unwrap();
        assert_eq!(
            instance,
            json!({
                "id": "0x1f",
                "className": "TestSchema.Foo",
                "Name": "first",
                "Size": 3,
                "Count": "0x218711a00",
                "Location": {"x": 1.0, "y": 2.0},
                "Tags": ["a", "b"],
                "Address": {"Street": "Main", "City": "Exton", "Geo": {"x": 1.5, "y": 2.5}}
            })
        );
    }

    #[test]
    fn test_format_navigation() {
        let catalog = test_catalog();
        let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
        mapper.map_all().unwrap();
        let element = catalog.resolve_class("ts:PhysicalElement", None).unwrap();
        let maps = mapper.class_map(element.id).unwrap().property_maps();

        let options = FormatOptions::default();
        let formatter = InstanceFormatter::new(&catalog, &options);
        // Code, Model, Origin, Mass
        let row = vec![
            json!("0x2"),
            json!(element.id.0),
            json!("E-1"),
            json!({"Id": 7}),
            json!({"x": 0.0, "y": 1.0, "z": 2.0}),
            json!(null),
        ];
        let instance = formatter.format_row(&row, &element, maps).unwrap();
        assert_eq!(
            instance["Model"],
            json!({"id": "0x7", "relClassName": "TestSchema.ModelContainsElements"})
        );
        assert_eq!(instance["Origin"], json!({"x": 0.0, "y": 1.0, "z": 2.0}));
        assert!(instance.get("Mass").is_none());
    }

    #[test]
    fn test_malformed_rows() {
        let catalog = test_catalog();
        let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
        mapper.map_all().unwrap();
        let bar = catalog.resolve_class("ts:Bar", None).unwrap();
        let maps = mapper.class_map(bar.id).unwrap().property_maps();
        let options = FormatOptions::default();
        let formatter = InstanceFormatter::new(&catalog, &options);

        assert!(matches!(
            formatter.format_row(&[json!(1)], &bar, maps),
            Err(ReaderError::MalformedRow { .. })
        ));
        assert!(matches!(
            formatter.format_row(&[json!("nope"), json!(bar.id.0), json!("t")], &bar, maps),
            Err(ReaderError::MalformedRow { .. })
        ));
    }
}
