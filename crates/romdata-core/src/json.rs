use std::fs::File;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::detect::{ReadLimits, RomInfo, detect};
use crate::error::Result;
use crate::model::{Field, FieldValue};

#[derive(Clone, Copy)]
pub struct JsonOpts {
    /// Rows kept per table field; the rest are counted, not printed.
    pub max_rows: usize,
    /// Include the typed record next to the display fields.
    pub raw: bool,
}

impl Default for JsonOpts {
    fn default() -> Self {
        Self {
            max_rows: 256,
            raw: false,
        }
    }
}

pub fn info_to_json(info: &RomInfo, opts: JsonOpts) -> Result<Value> {
    let mut fields = Map::new();
    for f in info.fields() {
        fields.insert(f.name.clone(), field_value_json(&f, &opts));
    }
    let mut out = Map::new();
    out.insert("format".into(), Value::String(info.format_name().into()));
    out.insert("fields".into(), Value::Object(fields));
    if let RomInfo::Vgm(vgm) = info {
        out.insert("metadata".into(), serde_json::to_value(vgm.metadata())?);
    }
    if opts.raw {
        out.insert("raw".into(), serde_json::to_value(info)?);
    }
    Ok(Value::Object(out))
}

fn field_value_json(field: &Field, opts: &JsonOpts) -> Value {
    match &field.value {
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::List { columns, rows } => {
            let max = opts.max_rows.min(rows.len());
            let mut v = json!({
                "columns": columns,
                "rows": &rows[..max],
            });
            if rows.len() > max {
                v["$truncated"] = json!(true);
                v["$omitted"] = json!(rows.len() - max);
            }
            v
        }
    }
}

pub fn dump_file_json(path: &Path, opts: JsonOpts, limits: &ReadLimits) -> Result<String> {
    let mut file = File::open(path)?;
    let info = detect(&mut file, limits)?;
    debug!(path = %path.display(), format = info.format_name(), "detected");
    let value = info_to_json(&info, opts)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

// Directory helpers
pub fn find_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name();
    let mut out = Vec::new();
    for entry in walker {
        match entry {
            Ok(e) if e.file_type().is_file() => out.push(e.into_path()),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping unreadable directory entry"),
        }
    }
    out
}

/// Every file under `dir` mapped to its result, or to `{"$error": ...}`
/// when it could not be read or identified.
pub fn dump_dir_map_json(
    dir: &Path,
    recursive: bool,
    opts: JsonOpts,
    limits: &ReadLimits,
) -> Result<String> {
    let mut map = Map::new();
    for path in find_files(dir, recursive) {
        let key = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        let value = File::open(&path)
            .map_err(Into::into)
            .and_then(|mut f| detect(&mut f, limits))
            .and_then(|info| info_to_json(&info, opts));
        let value = match value {
            Ok(v) => v,
            Err(e) => json!({ "$error": e.to_string() }),
        };
        map.insert(key, value);
    }
    Ok(serde_json::to_string_pretty(&Value::Object(map))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sndh::SndhInfo;

    #[test]
    fn tables_are_truncated() {
        let info = RomInfo::Sndh(SndhInfo {
            declared_subtunes: Some(5),
            subtune_lengths: vec![10, 20, 30, 40, 50],
            ..Default::default()
        });
        let v = info_to_json(&info, JsonOpts { max_rows: 2, raw: false }).unwrap();
        let list = &v["fields"]["Subtune List"];
        assert_eq!(list["rows"].as_array().unwrap().len(), 2);
        assert_eq!(list["$omitted"], json!(3));
        assert!(v.get("raw").is_none());
    }

    #[test]
    fn raw_record_is_optional() {
        let info = RomInfo::Sndh(SndhInfo {
            title: Some("Tune".into()),
            ..Default::default()
        });
        let v = info_to_json(&info, JsonOpts { raw: true, ..Default::default() }).unwrap();
        assert_eq!(v["format"], json!("Atari ST SNDH"));
        assert_eq!(v["fields"]["Song Title"], json!("Tune"));
        assert_eq!(v["raw"]["format"], json!("Sndh"));
        assert_eq!(v["raw"]["info"]["title"], json!("Tune"));
        assert!(v.get("metadata").is_none());
    }

    #[test]
    fn fields_keep_display_order() {
        let info = RomInfo::Sndh(SndhInfo {
            title: Some("Tune".into()),
            composer: Some("Mad Max".into()),
            declared_subtunes: Some(1),
            ..Default::default()
        });
        let expected: Vec<String> = info.fields().into_iter().map(|f| f.name).collect();
        assert_eq!(expected, ["Song Title", "Composer", "# of Subtunes"]);

        let v = info_to_json(&info, JsonOpts::default()).unwrap();
        let keys: Vec<&String> = v["fields"].as_object().unwrap().keys().collect();
        assert_eq!(keys, expected.iter().collect::<Vec<_>>());

        // order survives the text round trip as well
        let text = serde_json::to_string_pretty(&v).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        let keys: Vec<&String> = back["fields"].as_object().unwrap().keys().collect();
        assert_eq!(keys, expected.iter().collect::<Vec<_>>());
    }
}
