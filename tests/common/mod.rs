//! Shared fixtures for integration tests

use std::sync::Arc;

use drover::backend::mock::{MockEngine, NodeSpec};
use drover::Browser;

/// A small page with a form area and a sidebar:
///
/// ```text
/// body
/// ├── div#main.container
/// │   ├── input[name=q][type=text]
/// │   ├── a "next page"
/// │   └── select[name=color] (red, blue*)
/// └── div#sidebar
///     ├── input[name=q2][type=text]
///     └── a "previous page"
/// ```
pub fn sample_engine() -> Arc<MockEngine> {
    Arc::new(MockEngine::new(vec![
        NodeSpec::new("div")
            .attr("id", "main")
            .attr("class", "container")
            .child(
                NodeSpec::new("input")
                    .attr("name", "q")
                    .attr("type", "text"),
            )
            .child(NodeSpec::new("a").text("next page"))
            .child(
                NodeSpec::new("select")
                    .attr("name", "color")
                    .child(NodeSpec::new("option").attr("value", "red"))
                    .child(
                        NodeSpec::new("option")
                            .attr("value", "blue")
                            .attr("selected", ""),
                    ),
            ),
        NodeSpec::new("div").attr("id", "sidebar").child(
            NodeSpec::new("input")
                .attr("name", "q2")
                .attr("type", "text"),
        )
        .child(NodeSpec::new("a").text("previous page")),
    ]))
}

/// A browser facade over the sample page
pub async fn sample_browser() -> (Arc<MockEngine>, Arc<Browser>) {
    let engine = sample_engine();
    let browser = Arc::new(Browser::new(engine.clone()).await);
    (engine, browser)
}
