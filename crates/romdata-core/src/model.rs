use serde::Serialize;

/// One labelled line of a metadata display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    /// A small table, e.g. subtune or chip lists.
    List {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, FieldValue::Text(value.into()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Text(s) => Some(s),
            FieldValue::List { .. } => None,
        }
    }
}

/// Look up a field by display name.
pub fn find_field<'a>(fields: &'a [Field], name: &str) -> Option<&'a Field> {
    fields.iter().find(|f| f.name == name)
}

/// Render fields as aligned `name: value` lines, tables indented below.
pub fn render_fields(fields: &[Field]) -> String {
    let width = fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for f in fields {
        match &f.value {
            FieldValue::Text(s) => {
                out.push_str(&format!("{:<width$}  {}\n", format!("{}:", f.name), s, width = width + 1));
            }
            FieldValue::List { columns, rows } => {
                out.push_str(&format!("{}:\n", f.name));
                let widths: Vec<usize> = (0..columns.len())
                    .map(|c| {
                        rows.iter()
                            .filter_map(|r| r.get(c))
                            .map(|s| s.chars().count())
                            .chain(std::iter::once(columns[c].chars().count()))
                            .max()
                            .unwrap_or(0)
                    })
                    .collect();
                let line = |cells: &[String]| {
                    let mut l = String::from("   ");
                    for (c, w) in widths.iter().enumerate() {
                        let cell = cells.get(c).map(String::as_str).unwrap_or("");
                        l.push_str(&format!(" {cell:<w$}"));
                    }
                    l.truncate(l.trim_end().len());
                    l.push('\n');
                    l
                };
                out.push_str(&line(columns));
                for r in rows {
                    out.push_str(&line(r));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_fields_align() {
        let out = render_fields(&[Field::text("A", "1"), Field::text("Long", "2")]);
        assert_eq!(out, "A:     1\nLong:  2\n");
    }

    #[test]
    fn list_fields_render_as_table() {
        let list = FieldValue::List {
            columns: vec!["#".into(), "Name".into()],
            rows: vec![vec!["1".into(), "Intro".into()], vec!["10".into(), "X".into()]],
        };
        let out = render_fields(&[Field::new("Subtunes", list)]);
        assert_eq!(out, "Subtunes:\n    #  Name\n    1  Intro\n    10 X\n");
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&Field::text("Title", "x")).unwrap();
        assert_eq!(json, r#"{"name":"Title","value":"x"}"#);
    }
}
