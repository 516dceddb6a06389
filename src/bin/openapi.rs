use anyhow::Result;

// Print the OpenAPI document for the API, for docs tooling and CI diffs.
fn main() -> Result<()> {
    println!("{}", gardisto::api::openapi().to_pretty_json()?);

    Ok(())
}
