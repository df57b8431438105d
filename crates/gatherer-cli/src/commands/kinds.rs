//! Kinds command - the built-in kind catalogue

use console::style;
use gatherer_core::{KindBehavior, static_kinds};
use miette::IntoDiagnostic;

use crate::error::Result;

pub fn run(json: bool) -> Result<()> {
    let kinds = static_kinds();

    if json {
        let output = serde_json::to_string_pretty(&kinds).into_diagnostic()?;
        println!("{}", output);
        return Ok(());
    }

    println!(
        "{:<20} {:<24} {:<20} {:<10}",
        style("KIND").bold(),
        style("API VERSION").bold(),
        style("PLURAL").bold(),
        style("SCOPE").bold()
    );

    for (kind, spec) in &kinds {
        let scope = if spec.namespaced { "namespace" } else { "cluster" };
        let kind_style = match spec.behavior {
            KindBehavior::NodeCapacity => style(kind.as_str()).cyan(),
            KindBehavior::Workload => style(kind.as_str()),
        };
        println!(
            "{:<20} {:<24} {:<20} {:<10}",
            kind_style, spec.api_version, spec.plural, scope
        );
    }

    Ok(())
}
