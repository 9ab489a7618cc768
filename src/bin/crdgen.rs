use happy_helm::crd::all_crds;

fn main() -> anyhow::Result<()> {
    for crd in all_crds() {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
