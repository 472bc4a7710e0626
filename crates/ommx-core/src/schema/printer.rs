use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

/// Configuration for `.proto` rendering
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    /// Indentation string (default: 2 spaces)
    pub indent_str: String,
    /// Sort fields by number
    pub sort_fields: bool,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
            sort_fields: false,
        }
    }
}

impl PrinterConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }

    /// Sets whether to sort fields by number
    pub fn sort_fields(mut self, sort: bool) -> Self {
        self.sort_fields = sort;
        self
    }
}

/// Renders a proto3 [`FileDescriptorProto`] as `.proto` source
#[derive(Debug, Clone, Default)]
pub struct SchemaPrinter {
    config: PrinterConfig,
}

impl SchemaPrinter {
    /// Creates a printer with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a printer with custom config
    pub fn with_config(mut self, config: PrinterConfig) -> Self {
        self.config = config;
        self
    }

    /// Renders `file` as a string
    pub fn print(&self, file: &FileDescriptorProto) -> String {
        let mut output = String::new();
        self.write_to(file, &mut output).expect("String write cannot fail");
        output
    }

    /// Renders `file` into a writer
    pub fn write_to(
        &self,
        file: &FileDescriptorProto,
        w: &mut impl FmtWrite,
    ) -> std::fmt::Result {
        let mut writer = ProtoTextWriter {
            writer: w,
            config: &self.config,
            package_prefix: format!(".{}.", file.package()),
            indent_level: 0,
        };
        writer.write_file(file)
    }
}

struct ProtoTextWriter<'a, W: FmtWrite> {
    writer: &'a mut W,
    config: &'a PrinterConfig,
    package_prefix: String,
    indent_level: usize,
}

impl<'a, W: FmtWrite> ProtoTextWriter<'a, W> {
    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) -> std::fmt::Result {
        for _ in 0..self.indent_level {
            write!(self.writer, "{}", self.config.indent_str)?;
        }
        Ok(())
    }

    fn writeln(&mut self, s: &str) -> std::fmt::Result {
        self.write_indent()?;
        writeln!(self.writer, "{}", s)
    }

    fn write_file(&mut self, proto: &FileDescriptorProto) -> std::fmt::Result {
        let syntax = if proto.syntax().is_empty() {
            "proto2"
        } else {
            proto.syntax()
        };
        writeln!(self.writer, "syntax = \"{}\";", syntax)?;
        writeln!(self.writer)?;

        if !proto.package().is_empty() {
            writeln!(self.writer, "package {};", proto.package())?;
            writeln!(self.writer)?;
        }

        for message in &proto.message_type {
            self.write_message(message)?;
        }

        Ok(())
    }

    fn write_message(&mut self, message: &DescriptorProto) -> std::fmt::Result {
        self.writeln(&format!("message {} {{", message.name()))?;
        self.indent();

        for nested in &message.nested_type {
            // Map entries are written as map<K, V> fields
            if is_map_entry(nested) {
                continue;
            }
            self.write_message(nested)?;
        }

        for enum_type in &message.enum_type {
            self.write_enum(enum_type)?;
        }

        let mut fields: Vec<&FieldDescriptorProto> = message.field.iter().collect();
        if self.config.sort_fields {
            fields.sort_by_key(|f| f.number());
        }

        let mut oneof_fields: BTreeMap<i32, Vec<&FieldDescriptorProto>> = BTreeMap::new();
        for field in &fields {
            if let Some(oneof_index) = field.oneof_index {
                if !field.proto3_optional() {
                    oneof_fields.entry(oneof_index).or_default().push(*field);
                }
            }
        }

        for (index, members) in &oneof_fields {
            let Some(oneof) = usize::try_from(*index)
                .ok()
                .and_then(|i| message.oneof_decl.get(i))
            else {
                continue;
            };
            self.write_indent()?;
            writeln!(self.writer, "oneof {} {{", oneof.name())?;
            self.indent();
            for field in members {
                self.write_indent()?;
                write!(
                    self.writer,
                    "{} {} = {}",
                    self.field_type_name(field),
                    field.name(),
                    field.number()
                )?;
                self.write_field_options(field)?;
                writeln!(self.writer, ";")?;
            }
            self.dedent();
            self.writeln("}")?;
        }

        for field in fields {
            let in_real_oneof = field.oneof_index.is_some() && !field.proto3_optional();
            if !in_real_oneof {
                self.write_field(field, message)?;
            }
        }

        self.dedent();
        self.writeln("}")?;
        if self.indent_level == 0 {
            writeln!(self.writer)?;
        }

        Ok(())
    }

    fn write_field(
        &mut self,
        field: &FieldDescriptorProto,
        message: &DescriptorProto,
    ) -> std::fmt::Result {
        self.write_indent()?;

        if let Some(entry) = map_entry_of(field, message) {
            let key = entry.field.iter().find(|f| f.number() == 1);
            let value = entry.field.iter().find(|f| f.number() == 2);
            if let (Some(key), Some(value)) = (key, value) {
                return writeln!(
                    self.writer,
                    "map<{}, {}> {} = {};",
                    self.field_type_name(key),
                    self.field_type_name(value),
                    field.name(),
                    field.number()
                );
            }
        }

        let label = if field.label() == Label::Repeated {
            "repeated "
        } else if field.proto3_optional() {
            "optional "
        } else {
            ""
        };
        write!(
            self.writer,
            "{}{} {} = {}",
            label,
            self.field_type_name(field),
            field.name(),
            field.number()
        )?;
        self.write_field_options(field)?;
        writeln!(self.writer, ";")
    }

    /// Type name relative to the file package
    fn field_type_name(&self, field: &FieldDescriptorProto) -> String {
        match field.r#type() {
            Type::Message | Type::Enum => {
                let name = field.type_name();
                name.strip_prefix(self.package_prefix.as_str())
                    .unwrap_or(name)
                    .to_string()
            }
            scalar => scalar
                .as_str_name()
                .trim_start_matches("TYPE_")
                .to_ascii_lowercase(),
        }
    }

    fn write_field_options(&mut self, field: &FieldDescriptorProto) -> std::fmt::Result {
        let mut options = Vec::new();

        if let Some(json_name) = &field.json_name {
            if json_name != &to_lower_camel_case(field.name()) {
                options.push(format!("json_name = \"{}\"", json_name));
            }
        }

        if field
            .options
            .as_ref()
            .map_or(false, |o| o.deprecated.unwrap_or(false))
        {
            options.push("deprecated = true".to_string());
        }

        if !options.is_empty() {
            write!(self.writer, " [{}]", options.join(", "))?;
        }

        Ok(())
    }

    fn write_enum(&mut self, enum_type: &EnumDescriptorProto) -> std::fmt::Result {
        self.writeln(&format!("enum {} {{", enum_type.name()))?;
        self.indent();

        for value in &enum_type.value {
            self.write_indent()?;
            write!(self.writer, "{} = {}", value.name(), value.number())?;
            if value
                .options
                .as_ref()
                .map_or(false, |o| o.deprecated.unwrap_or(false))
            {
                write!(self.writer, " [deprecated = true]")?;
            }
            writeln!(self.writer, ";")?;
        }

        self.dedent();
        self.writeln("}")?;
        if self.indent_level == 0 {
            writeln!(self.writer)?;
        }

        Ok(())
    }
}

fn is_map_entry(message: &DescriptorProto) -> bool {
    message
        .options
        .as_ref()
        .map_or(false, |o| o.map_entry.unwrap_or(false))
}

/// The synthetic entry message of a map field, if `field` is one
fn map_entry_of<'m>(
    field: &FieldDescriptorProto,
    message: &'m DescriptorProto,
) -> Option<&'m DescriptorProto> {
    if field.label() != Label::Repeated || field.r#type() != Type::Message {
        return None;
    }
    let type_name = field.type_name();
    message.nested_type.iter().find(|nested| {
        is_map_entry(nested)
            && (type_name.ends_with(&format!(".{}", nested.name()))
                || type_name == nested.name())
    })
}

/// Convert a snake_case name to lowerCamelCase
fn to_lower_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use prost_types::FieldOptions;

    fn scalar(name: &str, number: i32) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(Type::Uint64 as i32),
            ..Default::default()
        }
    }

    fn file(fields: Vec<FieldDescriptorProto>) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("test.proto".to_string()),
            package: Some("test".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("M".to_string()),
                field: fields,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_to_lower_camel_case() {
        assert_eq!(to_lower_camel_case("hello_world"), "helloWorld");
        assert_eq!(to_lower_camel_case("simple"), "simple");
        assert_eq!(to_lower_camel_case("created_by"), "createdBy");
    }

    #[test]
    fn test_print_simple_message() {
        let output = SchemaPrinter::new().print(&file(vec![scalar("b", 2), scalar("a", 1)]));
        assert_eq!(
            output,
            "syntax = \"proto3\";\n\npackage test;\n\n\
             message M {\n  uint64 b = 2;\n  uint64 a = 1;\n}\n\n"
        );
    }

    #[test]
    fn test_sort_fields_and_indent() {
        let printer = SchemaPrinter::new()
            .with_config(PrinterConfig::new().indent_str("\t").sort_fields(true));
        let output = printer.print(&file(vec![scalar("b", 2), scalar("a", 1)]));
        assert!(output.contains("message M {\n\tuint64 a = 1;\n\tuint64 b = 2;\n}\n"));
    }

    #[test]
    fn test_field_options() {
        let custom = FieldDescriptorProto {
            json_name: Some("other".to_string()),
            options: Some(FieldOptions {
                deprecated: Some(true),
                ..Default::default()
            }),
            ..scalar("my_field", 1)
        };
        let camel = FieldDescriptorProto {
            json_name: Some("plainField".to_string()),
            ..scalar("plain_field", 2)
        };
        let output = SchemaPrinter::new().print(&file(vec![custom, camel]));
        assert!(
            output.contains("  uint64 my_field = 1 [json_name = \"other\", deprecated = true];\n")
        );
        assert!(output.contains("  uint64 plain_field = 2;\n"));
    }
}
