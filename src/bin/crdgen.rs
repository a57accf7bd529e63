// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from Rust types defined in src/crd.rs.
//! This keeps the YAML files in deploy/crds/ in sync with the Rust code.
//!
//! Usage:
//!   cargo run --bin crdgen
//!
//! Generated files will be written to deploy/crds/ with proper headers.

use kube::CustomResourceExt;
use std::fs;
use std::path::Path;
use vigil::crd::{
    APIServer, DeepPacketInspection, ImageSet, Installation, IntrusionDetection, LicenseKey,
    ManagementCluster, ManagementClusterConnection,
};

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");

    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_crd::<IntrusionDetection>("intrusiondetections.crd.yaml", output_dir)?;
    generate_crd::<Installation>("installations.crd.yaml", output_dir)?;
    generate_crd::<ImageSet>("imagesets.crd.yaml", output_dir)?;
    generate_crd::<LicenseKey>("licensekeys.crd.yaml", output_dir)?;
    generate_crd::<APIServer>("apiservers.crd.yaml", output_dir)?;
    generate_crd::<ManagementCluster>("managementclusters.crd.yaml", output_dir)?;
    generate_crd::<ManagementClusterConnection>(
        "managementclusterconnections.crd.yaml",
        output_dir,
    )?;
    generate_crd::<DeepPacketInspection>("deeppacketinspections.crd.yaml", output_dir)?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let yaml = serde_yaml::to_string(&T::crd())?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename}");

    Ok(())
}
