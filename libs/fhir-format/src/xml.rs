//! FHIR XML wire form.
//!
//! Schema-agnostic rendering of a mapping form to XML and back, following
//! the official JSON/XML mapping rules used by HL7 FHIR:
//! - The root element takes the resource's `resourceType` as its name.
//! - Primitive values ride in `value` attributes.
//! - Repeated elements map to arrays, with metadata arrays aligned by index.
//! - Primitive metadata (`id`, `extension`) travels in `_field` entries.

use crate::{FormatError, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use roxmltree::Document;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::io::Cursor;

const FHIR_NS: &str = "http://hl7.org/fhir";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Render a mapping form (as produced by the model's `dict`) to FHIR XML.
pub fn xml_dumps(resource: &Map<String, Value>) -> Result<String> {
    let resource_type = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or(FormatError::MissingResourceType)?;

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    let mut root = BytesStart::new(resource_type);
    root.push_attribute(("xmlns", FHIR_NS));
    writer.write_event(Event::Start(root))?;
    write_members(&mut writer, resource, &["resourceType"])?;
    writer.write_event(Event::End(BytesEnd::new(resource_type)))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

/// Parse FHIR XML into a mapping suitable for record construction.
pub fn xml_loads(input: &str) -> Result<Map<String, Value>> {
    let doc = Document::parse(input)?;
    let root = doc.root_element();

    let mut map = Map::new();
    map.insert(
        "resourceType".to_string(),
        Value::String(root.tag_name().name().to_string()),
    );
    map.extend(read_members(input, &root)?);
    Ok(map)
}

fn write_members(writer: &mut XmlWriter, obj: &Map<String, Value>, skip: &[&str]) -> Result<()> {
    // value members in declared order, each paired with its `_name` entry
    for (key, value) in obj {
        if key.starts_with('_') || skip.contains(&key.as_str()) {
            continue;
        }
        let meta = obj.get(&format!("_{key}"));
        write_member(writer, key, value, meta)?;
    }

    // metadata-only members: extensions on a primitive that carries no value
    for (key, meta) in obj {
        let Some(name) = key.strip_prefix('_') else {
            continue;
        };
        if !obj.contains_key(name) {
            write_member(writer, name, &Value::Null, Some(meta))?;
        }
    }
    Ok(())
}

fn write_member(
    writer: &mut XmlWriter,
    name: &str,
    value: &Value,
    meta: Option<&Value>,
) -> Result<()> {
    match value {
        Value::Array(items) => {
            let meta_items = meta.and_then(Value::as_array);
            for (idx, item) in items.iter().enumerate() {
                let item_meta = meta_items.and_then(|m| m.get(idx)).filter(|m| !m.is_null());
                write_member(writer, name, item, item_meta)?;
            }
        }
        Value::Object(obj) => write_complex(writer, name, obj)?,
        primitive => write_primitive(writer, name, primitive, meta)?,
    }
    Ok(())
}

fn write_complex(writer: &mut XmlWriter, name: &str, obj: &Map<String, Value>) -> Result<()> {
    let mut start = BytesStart::new(name);
    if let Some(Value::String(id)) = obj.get("id") {
        start.push_attribute(("id", id.as_str()));
    }
    // extension url lives in an attribute, not a child element
    let mut skip = vec!["id"];
    if is_extension(name) {
        if let Some(Value::String(url)) = obj.get("url") {
            start.push_attribute(("url", url.as_str()));
            skip.push("url");
        }
    }
    writer.write_event(Event::Start(start))?;
    write_members(writer, obj, &skip)?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn is_extension(name: &str) -> bool {
    name == "extension" || name == "modifierExtension"
}

fn write_primitive(
    writer: &mut XmlWriter,
    name: &str,
    value: &Value,
    meta: Option<&Value>,
) -> Result<()> {
    let mut elem = BytesStart::new(name);

    let has_value = !value.is_null();
    if has_value {
        elem.push_attribute(("value", primitive_to_string(value).as_str()));
    }

    let mut extension = None;
    if let Some(Value::Object(meta)) = meta {
        if let Some(Value::String(id)) = meta.get("id") {
            elem.push_attribute(("id", id.as_str()));
        }
        extension = meta.get("extension");
    }

    match extension {
        Some(ext) => {
            writer.write_event(Event::Start(elem.clone()))?;
            write_member(writer, "extension", ext, None)?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        // neither a value nor children: nothing to emit
        None if !has_value => {}
        None => writer.write_event(Event::Empty(elem))?,
    }
    Ok(())
}

fn primitive_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn read_members(source: &str, node: &roxmltree::Node) -> Result<Map<String, Value>> {
    // group repeated child elements by name, keeping first-appearance order
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<(Value, Option<Value>)>> = HashMap::new();

    for child in node.children().filter(|n| n.is_element()) {
        let name = child.tag_name().name().to_string();
        let entry = read_element(source, &child)?;
        match groups.get_mut(&name) {
            Some(items) => items.push(entry),
            None => {
                order.push(name.clone());
                groups.insert(name, vec![entry]);
            }
        }
    }

    let mut map = Map::new();
    for name in order {
        let items = groups.remove(&name).unwrap_or_default();
        if items.len() == 1 {
            let (value, meta) = items.into_iter().next().expect("length checked");
            map.insert(name.clone(), value);
            if let Some(meta) = meta {
                map.insert(format!("_{name}"), meta);
            }
        } else {
            let has_meta = items.iter().any(|(_, m)| m.is_some());
            let mut values = Vec::with_capacity(items.len());
            let mut metas = Vec::with_capacity(items.len());
            for (value, meta) in items {
                values.push(value);
                metas.push(meta.unwrap_or(Value::Null));
            }
            map.insert(name.clone(), Value::Array(values));
            if has_meta {
                map.insert(format!("_{name}"), Value::Array(metas));
            }
        }
    }
    Ok(map)
}

fn read_element(source: &str, node: &roxmltree::Node) -> Result<(Value, Option<Value>)> {
    // narrative: keep the xhtml subtree verbatim
    if node.tag_name().namespace().is_some_and(|ns| ns == XHTML_NS) {
        let snippet = &source[node.range()];
        return Ok((Value::String(snippet.to_string()), None));
    }

    if let Some(value) = node.attribute("value") {
        let mut meta = Map::new();
        if let Some(id) = node.attribute("id") {
            meta.insert("id".to_string(), Value::String(id.to_string()));
        }
        let mut extensions = Vec::new();
        for child in node.children().filter(|c| c.is_element()) {
            if child.tag_name().name() == "extension" {
                let (ext, _) = read_element(source, &child)?;
                extensions.push(ext);
            }
        }
        if !extensions.is_empty() {
            meta.insert("extension".to_string(), Value::Array(extensions));
        }
        let meta = (!meta.is_empty()).then(|| Value::Object(meta));
        return Ok((parse_primitive(value), meta));
    }

    let mut obj = Map::new();
    if let Some(id) = node.attribute("id") {
        obj.insert("id".to_string(), Value::String(id.to_string()));
    }
    if is_extension(node.tag_name().name()) {
        if let Some(url) = node.attribute("url") {
            obj.insert("url".to_string(), Value::String(url.to_string()));
        }
    }
    obj.extend(read_members(source, node)?);
    Ok((Value::Object(obj), None))
}

fn parse_primitive(input: &str) -> Value {
    match input {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(int) = input.parse::<i64>() {
                Value::Number(int.into())
            } else if let Some(num) = input
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(Number::from_f64)
            {
                Value::Number(num)
            } else {
                Value::String(input.to_string())
            }
        }
    }
}
