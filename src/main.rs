mod cmdline;
mod driver;

use esi_utils::EsiResult;

fn main() -> EsiResult<()> {
    driver::run_esic()
}
