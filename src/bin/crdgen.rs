//! # CRD Generator
//!
//! Prints the `Application` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/application.yaml
//! ```

use kube::core::CustomResourceExt;
use runtime_agent::crd::Application;

fn main() {
    let crd = Application::crd();

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => print!("{yaml}"),
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
