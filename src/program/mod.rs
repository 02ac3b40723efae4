//! Build-time constants: the dependency list and the program to run.

use crate::provision::DependencySpec;

/// Installed in this order; later entries rely on earlier ones.
pub const DEPENDENCIES: &[&str] = &[
    "https://cdn.holoviz.org/panel/1.0.3/dist/wheels/bokeh-3.1.1-py3-none-any.whl",
    "https://cdn.holoviz.org/panel/1.0.3/dist/wheels/panel-1.0.3-py3-none-any.whl",
    "pyodide-http==0.2.1",
    "geopandas",
    "pandas",
];

/// The visualization program. Its last expression evaluates to
/// `(docs_json, render_items, root_ids)`.
pub const PROGRAM: &str = include_str!("app.py");

pub fn dependencies() -> Vec<DependencySpec> {
    DEPENDENCIES.iter().copied().map(DependencySpec::from).collect()
}
