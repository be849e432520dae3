use clap::{App, Arg, ArgMatches};

pub fn parse_args<'a>() -> ArgMatches<'a> {
    App::new("beamline")
        .version("0.1")
        .author("Beamline Optics Group")
        .about("Synchrotron-beamline ray-tracing engine")
        .arg(
            Arg::with_name("INPUT")
                .required(true)
                .index(1)
                .help("System description file (XML or legacy text/binary)"),
        )
        .arg(
            Arg::with_name("legacy")
                .long("legacy")
                .help("Treat INPUT as a legacy binary/TCL element dump instead of XML"),
        )
        .arg(
            Arg::with_name("wavelength")
                .long("wavelength")
                .short("w")
                .help("Alignment and generation wavelength, in metres")
                .takes_value(true)
                .default_value("5e-7"),
        )
        .arg(
            Arg::with_name("source")
                .long("source")
                .short("s")
                .help("Name of the source element to radiate from")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("nrays")
                .long("nrays")
                .short("n")
                .help("Number of rays to generate at the source")
                .takes_value(true)
                .default_value("1000"),
        )
        .arg(
            Arg::with_name("spot-out")
                .long("spot-out")
                .short("o")
                .help("Write the final element's spot diagram (binary dump) to this file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("save-xml")
                .long("save-xml")
                .help("Re-serialise the aligned system to this XML file before exiting")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("threads")
                .long("threads")
                .short("t")
                .help("Number of worker threads for parallel propagation")
                .takes_value(true),
        )
        .arg(Arg::with_name("verbose").short("v").help("log debug information"))
        .get_matches()
}
