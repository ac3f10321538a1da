// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Scale Invariant

//! Layout File Codec - XML parsing and writing
//!
//! File format:
//!
//! ```xml
//! <Layout>
//!   <Panel location="bottom" height="48" floating="true" alignment="center" lengthMode="fit">
//!     <Widget id="org.kde.plasma.icontasks">
//!       <Config key="General/launchers" value="applications:firefox.desktop"/>
//!     </Widget>
//!   </Panel>
//! </Layout>
//! ```
//!
//! Parsing is structural only: enumerated attributes are stored as written and
//! checked later by `LayoutModel::validate`. Unknown elements and attributes are
//! ignored so newer files still load.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};

use crate::pfgc_core::{parse_bool, Scalar};
use crate::pfgl_layout::{LayoutModel, PanelSpec, WidgetSpec};

// ============================================================================
// SECTION 1: Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: usize, message: String },

    #[error("at byte {position}: {element} missing required attribute '{attribute}'")]
    MissingAttribute {
        position: usize,
        element: &'static str,
        attribute: &'static str,
    },

    #[error("at byte {position}: invalid {attribute} value '{value}' on {element}")]
    InvalidValue {
        position: usize,
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("no <Layout> root element found")]
    MissingRoot,
}

fn xml_error(position: usize, err: impl std::fmt::Display) -> ParseError {
    ParseError::Xml { position, message: err.to_string() }
}

// ============================================================================
// SECTION 2: XML parsing
// ============================================================================

/// Parse a layout document into a model
pub fn parse_layout(xml: &str) -> Result<LayoutModel, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut panels = Vec::new();
    let mut seen_root = false;
    let mut in_layout = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Layout" => {
                    seen_root = true;
                    in_layout = true;
                }
                b"Panel" if in_layout => {
                    let mut panel = parse_panel_attrs(e, reader.buffer_position())?;
                    parse_panel_body(&mut reader, &mut panel)?;
                    panels.push(panel);
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"Layout" => seen_root = true,
                b"Panel" if in_layout => {
                    panels.push(parse_panel_attrs(e, reader.buffer_position())?);
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Layout" => in_layout = false,
            Ok(Event::Eof) if in_layout => {
                return Err(xml_error(reader.buffer_position(), "unexpected EOF in Layout"));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(ParseError::MissingRoot);
    }

    Ok(LayoutModel { panels })
}

fn parse_panel_attrs(e: &BytesStart, position: usize) -> Result<PanelSpec, ParseError> {
    let mut location = None;
    let mut panel = PanelSpec::new("");

    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(position, format!("attribute error: {}", err)))?;
        let value = attr.unescape_value().map_err(|err| xml_error(position, err))?.into_owned();

        match attr.key.as_ref() {
            b"location" => location = Some(value),
            b"height" => {
                let h = value.trim().parse::<i64>().map_err(|_| ParseError::InvalidValue {
                    position,
                    element: "Panel",
                    attribute: "height",
                    value: value.clone(),
                })?;
                panel.height = Some(h);
            }
            b"hidingMode" => panel.hiding_mode = Some(value),
            b"floating" => {
                let f = parse_bool(&value).ok_or_else(|| ParseError::InvalidValue {
                    position,
                    element: "Panel",
                    attribute: "floating",
                    value: value.clone(),
                })?;
                panel.floating = Some(f);
            }
            b"alignment" => panel.alignment = Some(value),
            b"lengthMode" => panel.length_mode = Some(value),
            _ => {}
        }
    }

    panel.location = location.ok_or(ParseError::MissingAttribute {
        position,
        element: "Panel",
        attribute: "location",
    })?;
    Ok(panel)
}

fn parse_panel_body(reader: &mut Reader<&[u8]>, panel: &mut PanelSpec) -> Result<(), ParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"Widget" => {
                panel.widgets.push(parse_widget_attrs(e, reader.buffer_position())?);
            }
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Widget" => {
                let mut widget = parse_widget_attrs(e, reader.buffer_position())?;
                parse_widget_body(reader, &mut widget)?;
                panel.widgets.push(widget);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Panel" => break,
            Ok(Event::Eof) => return Err(xml_error(reader.buffer_position(), "unexpected EOF in Panel")),
            Err(e) => return Err(xml_error(reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_widget_attrs(e: &BytesStart, position: usize) -> Result<WidgetSpec, ParseError> {
    let mut identifier = None;

    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(position, format!("attribute error: {}", err)))?;
        if attr.key.as_ref() == b"id" {
            identifier = Some(attr.unescape_value().map_err(|err| xml_error(position, err))?.into_owned());
        }
    }

    let identifier = identifier.ok_or(ParseError::MissingAttribute {
        position,
        element: "Widget",
        attribute: "id",
    })?;
    Ok(WidgetSpec::new(identifier))
}

fn parse_widget_body(reader: &mut Reader<&[u8]>, widget: &mut WidgetSpec) -> Result<(), ParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"Config" => {
                let position = reader.buffer_position();
                let (key, value) = parse_config_entry(e, position)?;
                insert_config(widget, key, value, position)?;
            }
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Config" => {
                let position = reader.buffer_position();
                let (key, value) = parse_config_entry(e, position)?;
                // <Config ...></Config> carries nothing inside
                let mut skip = Vec::new();
                reader
                    .read_to_end_into(QName(b"Config"), &mut skip)
                    .map_err(|err| xml_error(reader.buffer_position(), err))?;
                insert_config(widget, key, value, position)?;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Widget" => break,
            Ok(Event::Eof) => return Err(xml_error(reader.buffer_position(), "unexpected EOF in Widget")),
            Err(e) => return Err(xml_error(reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn insert_config(widget: &mut WidgetSpec, key: String, value: Scalar, position: usize) -> Result<(), ParseError> {
    if widget.config.contains_key(&key) {
        return Err(ParseError::InvalidValue { position, element: "Config", attribute: "key", value: key });
    }
    widget.config.insert(key, value);
    Ok(())
}

fn parse_config_entry(e: &BytesStart, position: usize) -> Result<(String, Scalar), ParseError> {
    let mut key = None;
    let mut raw = None;
    let mut type_name = "string".to_string();

    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(position, format!("attribute error: {}", err)))?;
        let value = attr.unescape_value().map_err(|err| xml_error(position, err))?.into_owned();

        match attr.key.as_ref() {
            b"key" => key = Some(value),
            b"value" => raw = Some(value),
            b"type" => type_name = value,
            _ => {}
        }
    }

    let key = key.ok_or(ParseError::MissingAttribute { position, element: "Config", attribute: "key" })?;
    let raw = raw.ok_or(ParseError::MissingAttribute { position, element: "Config", attribute: "value" })?;

    if !matches!(type_name.as_str(), "string" | "int" | "float" | "bool") {
        return Err(ParseError::InvalidValue { position, element: "Config", attribute: "type", value: type_name });
    }
    let value = Scalar::parse_typed(&type_name, &raw)
        .ok_or(ParseError::InvalidValue { position, element: "Config", attribute: "value", value: raw.clone() })?;

    Ok((key, value))
}

// ============================================================================
// SECTION 3: XML writing
// ============================================================================

/// Serialize a model in the format accepted by `parse_layout`
pub fn to_xml(model: &LayoutModel) -> quick_xml::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("Layout")))?;

    for panel in &model.panels {
        let mut el = BytesStart::new("Panel");
        el.push_attribute(("location", panel.location.as_str()));
        if let Some(h) = panel.height {
            el.push_attribute(("height", h.to_string().as_str()));
        }
        if let Some(ref mode) = panel.hiding_mode {
            el.push_attribute(("hidingMode", mode.as_str()));
        }
        if let Some(f) = panel.floating {
            el.push_attribute(("floating", if f { "true" } else { "false" }));
        }
        if let Some(ref align) = panel.alignment {
            el.push_attribute(("alignment", align.as_str()));
        }
        if let Some(ref mode) = panel.length_mode {
            el.push_attribute(("lengthMode", mode.as_str()));
        }

        if panel.widgets.is_empty() {
            writer.write_event(Event::Empty(el))?;
            continue;
        }

        writer.write_event(Event::Start(el))?;
        for widget in &panel.widgets {
            let mut w = BytesStart::new("Widget");
            w.push_attribute(("id", widget.identifier.as_str()));

            if widget.config.is_empty() {
                writer.write_event(Event::Empty(w))?;
                continue;
            }

            writer.write_event(Event::Start(w))?;
            for (key, value) in &widget.config {
                let mut c = BytesStart::new("Config");
                c.push_attribute(("key", key.as_str()));
                c.push_attribute(("value", value.to_string().as_str()));
                if !matches!(value, Scalar::Text(_)) {
                    c.push_attribute(("type", value.type_name()));
                }
                writer.write_event(Event::Empty(c))?;
            }
            writer.write_event(Event::End(BytesEnd::new("Widget")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("Panel")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Layout")))?;

    let mut out = String::from_utf8_lossy(&writer.into_inner()).into_owned();
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pfgl_layout::{IndexPath, ValidationErrorKind};

    #[test]
    fn test_parse_two_panel_layout() {
        let xml = r#"
            <Layout>
                <Panel location="top" height="30">
                    <Widget id="menu"/>
                    <Widget id="clock"/>
                    <Widget id="tray"/>
                </Panel>
                <Panel location="bottom" height="48" floating="true" alignment="center" lengthMode="fit">
                    <Widget id="icontasks"/>
                </Panel>
            </Layout>
        "#;

        let model = parse_layout(xml).unwrap();
        assert_eq!(model.panels.len(), 2);
        assert_eq!(model.panels[0].location, "top");
        assert_eq!(model.panels[0].height, Some(30));
        let ids: Vec<&str> = model.panels[0].widgets.iter().map(|w| w.identifier.as_str()).collect();
        assert_eq!(ids, vec!["menu", "clock", "tray"]);
        assert_eq!(model.panels[1].floating, Some(true));
        assert_eq!(model.panels[1].alignment.as_deref(), Some("center"));
        assert_eq!(model.panels[1].length_mode.as_deref(), Some("fit"));
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_unknown_location_survives_parse() {
        let xml = r#"<Layout><Panel location="top"/><Panel location="diagonal"/></Layout>"#;
        let model = parse_layout(xml).unwrap();
        let err = model.validate().unwrap_err();
        assert_eq!(err.path, IndexPath { panel: 1, widget: None });
        assert!(matches!(err.kind, ValidationErrorKind::UnknownLocation(ref s) if s == "diagonal"));
    }

    #[test]
    fn test_empty_layout() {
        assert_eq!(parse_layout("<Layout/>").unwrap(), LayoutModel::default());
        assert_eq!(parse_layout("<Layout></Layout>").unwrap(), LayoutModel::default());
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(parse_layout("<Panels/>"), Err(ParseError::MissingRoot)));
    }

    #[test]
    fn test_missing_location() {
        let err = parse_layout(r#"<Layout><Panel height="30"/></Layout>"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingAttribute { element: "Panel", attribute: "location", .. }));
    }

    #[test]
    fn test_invalid_height_and_floating() {
        let err = parse_layout(r#"<Layout><Panel location="top" height="tall"/></Layout>"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { attribute: "height", .. }));

        let err = parse_layout(r#"<Layout><Panel location="top" floating="maybe"/></Layout>"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { attribute: "floating", .. }));
    }

    #[test]
    fn test_negative_height_is_left_to_validation() {
        let model = parse_layout(r#"<Layout><Panel location="top" height="-5"/></Layout>"#).unwrap();
        assert_eq!(model.panels[0].height, Some(-5));
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_mismatched_tags() {
        let err = parse_layout(r#"<Layout><Panel location="top"></Layout>"#).unwrap_err();
        assert!(matches!(err, ParseError::Xml { .. }));
    }

    #[test]
    fn test_widget_config_types() {
        let xml = r#"
            <Layout>
                <Panel location="top">
                    <Widget id="org.kde.plasma.digitalclock">
                        <Config key="showDate" value="false" type="bool"/>
                        <Config key="Appearance/fontSize" value="11" type="int"/>
                        <Config key="dateFormat" value="isoDate"/>
                    </Widget>
                </Panel>
            </Layout>
        "#;
        let model = parse_layout(xml).unwrap();
        let config = &model.panels[0].widgets[0].config;
        assert_eq!(config.get("showDate"), Some(&Scalar::Bool(false)));
        assert_eq!(config.get("Appearance/fontSize"), Some(&Scalar::Int(11)));
        assert_eq!(config.get("dateFormat"), Some(&Scalar::Text("isoDate".to_string())));
    }

    #[test]
    fn test_truncated_layout() {
        let err = parse_layout(
            r#"<Layout><Panel location="top"/><Panel location="bottom"><Widget id="a"/></Panel>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Xml { ref message, .. } if message.contains("EOF in Layout")));

        // cut inside a panel is caught by the panel reader
        assert!(parse_layout(r#"<Layout><Panel location="top"><Widget id="a"/>"#).is_err());
    }

    #[test]
    fn test_config_with_end_tag() {
        let xml = r#"
            <Layout>
                <Panel location="top">
                    <Widget id="w">
                        <Config key="k" value="v"></Config>
                        <Config key="n" value="3" type="int"/>
                    </Widget>
                </Panel>
            </Layout>
        "#;
        let model = parse_layout(xml).unwrap();
        let config = &model.panels[0].widgets[0].config;
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("k"), Some(&Scalar::Text("v".to_string())));
        assert_eq!(config.get("n"), Some(&Scalar::Int(3)));
    }

    #[test]
    fn test_duplicate_config_key() {
        let err = parse_layout(
            r#"<Layout><Panel location="top"><Widget id="w"><Config key="k" value="1"/><Config key="k" value="2"/></Widget></Panel></Layout>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { element: "Config", attribute: "key", ref value, .. } if value == "k"));
    }

    #[test]
    fn test_bad_config_entries() {
        let err = parse_layout(
            r#"<Layout><Panel location="top"><Widget id="w"><Config key="k" value="x" type="int"/></Widget></Panel></Layout>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { element: "Config", attribute: "value", .. }));

        let err = parse_layout(
            r#"<Layout><Panel location="top"><Widget id="w"><Config key="k" value="x" type="color"/></Widget></Panel></Layout>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { attribute: "type", .. }));

        let err = parse_layout(r#"<Layout><Panel location="top"><Widget/></Panel></Layout>"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingAttribute { element: "Widget", attribute: "id", .. }));
    }

    #[test]
    fn test_written_layout_reads_back() {
        let mut dock = PanelSpec::new("bottom").with_widgets(["org.kde.plasma.icontasks"]);
        dock.height = Some(48);
        dock.floating = Some(false);
        dock.hiding_mode = Some("auto-hide".to_string());
        dock.widgets[0].config.insert("launchers".to_string(), Scalar::Text("a <b> & \"c\"".to_string()));
        dock.widgets[0].config.insert("iconSpacing".to_string(), Scalar::Int(2));
        dock.widgets[0].config.insert("scale".to_string(), Scalar::Float(1.5));
        let model = LayoutModel::new(vec![PanelSpec::new("left"), dock]);

        let xml = to_xml(&model).unwrap();
        assert!(xml.contains(r#"<Panel location="left"/>"#));
        assert_eq!(parse_layout(&xml).unwrap(), model);
    }
}
