use loadscene::entry;
use loadscene::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
