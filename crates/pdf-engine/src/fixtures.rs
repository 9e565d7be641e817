//! In-memory PDF builder used by tests across the workspace.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Builds a small, valid PDF with one text line per `\n`-separated line of
/// each page's text.
#[derive(Debug, Clone, Default)]
pub struct FixturePdf {
    title: Option<String>,
    pages: Vec<String>,
}

impl FixturePdf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    pub fn page(mut self, text: &str) -> Self {
        self.pages.push(text.to_owned());
        self
    }

    pub fn pages<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.pages.extend(texts.into_iter().map(|text| text.as_ref().to_owned()));
        self
    }

    /// Serializes the document. Panics if lopdf fails to encode, which only
    /// happens on a programming error in the fixture itself.
    pub fn build(&self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());

        for text in &self.pages {
            let mut operations = Vec::new();
            let mut y = 720;

            for line in text.lines() {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
                operations.push(Operation::new("Td", vec![72.into(), y.into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(line)]));
                operations.push(Operation::new("ET", vec![]));
                y -= 16;
            }

            let content = Content { operations };
            let encoded = content.encode().expect("fixture content should encode");
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if let Some(title) = &self.title {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title.as_str()),
            });
            doc.trailer.set("Info", info_id);
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture document should serialize");
        bytes
    }
}
