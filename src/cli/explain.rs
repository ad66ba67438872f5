// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Explain command - describe an error kind

use colored::Colorize;
use miette::Result;

use crate::errors::{EducationalMessage, ErrorKind};
use crate::utils::{print_header, print_section};

/// Run the explain command
pub async fn run(kind: String, verbose: bool) -> Result<()> {
    let kind: ErrorKind = kind.parse()?;
    let message = EducationalMessage::for_kind(kind);

    print_header(kind.as_str());
    println!("{}", message.format());

    if verbose {
        print_section("Related kinds");
        for other in ErrorKind::ALL.iter().filter(|k| **k != kind) {
            println!("  {}", other.as_str().dimmed());
        }
    }

    Ok(())
}
