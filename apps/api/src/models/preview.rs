use serde::{Deserialize, Serialize};

/// Resume content as the preview renders it. Sections are already in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewDocument {
    pub name: String,
    /// Contact line(s) under the name: email, phone, links.
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub sections: Vec<PreviewSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewSection {
    pub heading: String,
    /// One entry per rendered bullet or paragraph.
    #[serde(default)]
    pub items: Vec<String>,
}

impl PreviewDocument {
    /// True when nothing would be drawn on the page.
    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
            && self.headline.as_deref().map_or(true, |h| h.trim().is_empty())
            && self.sections.is_empty()
    }
}
