//! 元素列表输出

use crate::CliResult;
use bison_wire::json::element_to_json;
use bison_wire::RawDocument;
use colored::Colorize;

pub struct Formatter {
    color: bool,
}

impl Formatter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// 每个元素一行：`key  type  value`，末尾附统计行
    ///
    /// 嵌套文档与数组的值以扩展 JSON 显示。
    pub fn format_elements(&self, doc: &RawDocument<'_>) -> CliResult<String> {
        let mut rows = Vec::new();
        for element in doc.iter() {
            let element = element?;
            rows.push((
                element.key(),
                element.tag().name(),
                element_to_json(&element)?.to_string(),
            ));
        }

        let key_width = rows.iter().map(|r| r.0.chars().count()).max().unwrap_or(0);
        let type_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0);

        let mut out = String::new();
        for (key, type_name, value) in &rows {
            let key = format!("{:<width$}", key, width = key_width);
            let type_name = format!("{:<width$}", type_name, width = type_width);
            if self.color {
                out.push_str(&format!("{}  {}  {}\n", key.bold(), type_name.cyan(), value));
            } else {
                out.push_str(&format!("{}  {}  {}\n", key, type_name, value));
            }
        }

        let summary = format!(
            "{} element(s), {} bytes",
            rows.len(),
            doc.as_bytes().len()
        );
        if self.color {
            out.push_str(&summary.dimmed().to_string());
        } else {
            out.push_str(&summary);
        }
        out.push('\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bison_wire::{array, doc, encode_to_vec};

    #[test]
    fn test_plain_table() {
        let bytes = encode_to_vec(&doc! {
            "name" => "bison",
            "n" => 7i32,
            "list" => array![1i32, true],
        })
        .unwrap();
        let raw = RawDocument::parse(&bytes).unwrap();
        let text = Formatter::new(false).format_elements(&raw).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#"name  string  "bison""#);
        assert_eq!(lines[1], "n     int32   7");
        assert_eq!(lines[2], "list  array   [1,true]");
        assert_eq!(lines[3], format!("3 element(s), {} bytes", bytes.len()));
    }

    #[test]
    fn test_empty_document() {
        let raw = RawDocument::parse(&[5, 0, 0, 0, 0]).unwrap();
        let text = Formatter::new(false).format_elements(&raw).unwrap();
        assert_eq!(text, "0 element(s), 5 bytes\n");
    }
}
