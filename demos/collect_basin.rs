use precip_loader::tables::field_to_frame;
use precip_loader::{LatLon, LocationSpec, PrecipError, PrecipLoader};
use std::env;

fn main() -> Result<(), PrecipError> {
    configure_polars_display();
    let loader = PrecipLoader::new()?;
    let basin = env::args().nth(1).unwrap_or_else(|| "indus".to_string());

    let cru = loader
        .cru()
        .location(&LocationSpec::from(basin.as_str()))
        .min_year(1990.0)
        .max_year(2000.0)
        .call()?;
    println!(
        "CRU over {}: {:?} (time, lat, lon), {} valid values",
        basin,
        cru.shape(),
        cru.valid_count()
    );

    let gauge_site = LocationSpec::Coordinate(LatLon(31.65, 77.34));
    let aphrodite = loader
        .aphrodite()
        .location(&gauge_site)
        .min_year(1990.0)
        .max_year(2000.0)
        .call()?;
    println!("{}", field_to_frame(&aphrodite)?);

    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    // show 20 rows
    env::set_var("POLARS_FMT_MAX_ROWS", "20");
}
