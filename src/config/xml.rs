use serde::Deserialize;

/// One `<property>` entry of a site file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: String,
    pub is_final: bool,
}

#[derive(Debug, Deserialize)]
struct XmlConfiguration {
    #[serde(rename = "property", default)]
    properties: Vec<XmlProperty>,
}

#[derive(Debug, Deserialize)]
struct XmlProperty {
    name: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(rename = "final", default)]
    is_final: Option<String>,
}

/// Parses a Hadoop-style `<configuration>` document.
///
/// Elements other than `name`, `value` and `final` (e.g. `description`,
/// `source`) are ignored.
pub fn parse(xml: &str) -> Result<Vec<Property>, quick_xml::de::DeError> {
    let configuration: XmlConfiguration = quick_xml::de::from_str(xml)?;

    Ok(configuration
        .properties
        .into_iter()
        .map(|p| Property {
            name: p.name.trim().to_owned(),
            value: p.value.unwrap_or_default(),
            is_final: p.is_final.is_some_and(|f| f.trim() == "true"),
        })
        .collect())
}
