use linkpulse::error::AppResult;

fn main() -> AppResult<()> {
    linkpulse::entry::run()
}
