use super::Article;

ignore_property!(Article, "body");

impl Article {
    pub fn title(&self) -> String {
        self.content()
            .value::<String>("title")
            .unwrap_or_else(|| "Untitled".to_string())
    }
}
