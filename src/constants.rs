//! Application constants for the CDO client
//!
//! This module contains environment variable names, the command-line flags
//! understood by the CDO binary, default values, and the operator-arity
//! tables used for tools that cannot report arities themselves.

// =============================================================================
// Environment
// =============================================================================

/// Overrides the path of the CDO binary
pub const ENV_CDO_EXECUTABLE: &str = "CDO";

/// Any value enables debug tracing of every call
pub const ENV_DEBUG: &str = "DEBUG";

/// Per-call overridable output file suffix read by the tool itself
pub const ENV_FILE_SUFFIX: &str = "CDO_FILE_SUFFIX";

/// Executable used when `CDO` is not set
pub const DEFAULT_EXECUTABLE: &str = "cdo";

// =============================================================================
// Tool command line
// =============================================================================

pub const FLAG_VERSION: &str = "-V";
pub const FLAG_HELP: &str = "-h";
pub const FLAG_OVERWRITE: &str = "-O";
pub const FLAG_OPERATORS: &str = "--operators";
pub const FLAG_OPERATORS_NO_OUTPUT: &str = "--operators_no_output";
pub const FLAG_CONFIG: &str = "--config";
pub const CONFIG_ALL: &str = "all";

/// Format selector injected when a result must be read back as arrays
pub const STRUCTURED_FORMAT_OPTION: &[&str] = &["-f", "nc"];

/// Option tokens that already select an output format
pub const FORMAT_OPTION_TOKENS: &[&str] = &["-f", "--format"];

// =============================================================================
// Discovery
// =============================================================================

/// Help output with this many lines or fewer cannot hold an operator listing
pub const MIN_HELP_LINES: usize = 5;

/// Header preceding the operator listing in free-text help
pub const OPERATORS_HEADER: &str = "Operators:";

/// Pattern of the banner line closing the operator listing in free-text help
pub const VERSION_BANNER_PATTERN: &str = r"CDO version";

/// Pattern of a dotted numeric version token
pub const VERSION_TOKEN_PATTERN: &str = r"\d+\.\d+(?:\.\d+)*";

/// Versions at which the discovery protocol of the tool changed
pub mod eras {
    /// Help lists all operators on one line; undocumented ones are missing
    pub const SINGLE_LINE_HELP_BEFORE: &str = "1.5.6";

    /// Free-text help is the only listing before this version
    pub const OPERATORS_FLAG_FROM: &str = "1.7.2";

    /// `--operators_no_output` is available from this version
    pub const NO_OUTPUT_FLAG_FROM: &str = "1.8.0";

    /// `--operators_no_output` is broken in exactly this release
    pub const NO_OUTPUT_FLAG_BROKEN: &str = "1.9.0";

    /// `--operators` encodes `(inputs|outputs)` from this version
    pub const ARITY_SUFFIX_FROM: &str = "1.9.3";

    /// `--config all` JSON dump is available after this version
    pub const CONFIG_JSON_AFTER: &str = "1.9.3";

    /// Default version from which "diff"-family operators exit 1 on success
    pub const DIFF_EXIT_THRESHOLD: &str = "1.9.7";
}

// =============================================================================
// Operator families
// =============================================================================

/// Operators whose name starts with this may exit 1 on success
pub const DIFF_FAMILY_PREFIX: &str = "diff";

/// Operators whose name starts with this write an input-dependent file set
pub const SPLIT_FAMILY_PREFIX: &str = "split";

/// Highest exit code counted as success for "diff"-family operators
pub const DIFF_SUCCESS_CODE: i32 = 1;

/// Offset added to a terminating signal number to form a synthetic exit code
pub const SIGNAL_EXIT_BASE: i32 = 256;

// =============================================================================
// Temporary files
// =============================================================================

/// Name prefix tagging files created by the temp store
pub const DEFAULT_TEMP_PREFIX: &str = "cdo_rs_";

/// Upper bound of pseudo-random names issued in persistent mode
pub const PERSISTENT_NAME_RANGE: u32 = 10_000_000;

// =============================================================================
// Operator arity tables
// =============================================================================

/// Arity corrections for tools that cannot report them (valid up to 1.9.2)
pub mod arity_tables {
    /// Operators writing to stdout only
    pub const NO_OUTPUT: &[&str] = &[
        "cdiread", "cmor", "codetab", "conv_cmor_table", "diff", "diffc", "diffn",
        "diffp", "diffv", "dump_cmor_table", "dumpmap", "filedes", "gmtcells", "gmtxyz",
        "gradsdes", "griddes", "griddes2", "gridverify", "info", "infoc", "infon", "infop",
        "infos", "infov", "map", "ncode", "ndate", "ngridpoints", "ngrids", "nlevel", "nmon",
        "npar", "ntime", "nvar", "nyear", "output", "outputarr", "outputbounds",
        "outputboundscpt", "outputcenter", "outputcenter2", "outputcentercpt", "outputext",
        "outputf", "outputfld", "outputint", "outputkey", "outputsrv", "outputtab",
        "outputtri", "outputts", "outputvector", "outputvrml", "outputxyz", "pardes",
        "partab", "partab2", "seinfo", "seinfoc", "seinfon", "seinfop", "showattribute",
        "showatts", "showattsglob", "showattsvar", "showcode", "showdate", "showformat",
        "showgrid", "showlevel", "showltype", "showmon", "showname", "showparam",
        "showstdname", "showtime", "showtimestamp", "showunit", "showvar", "showyear",
        "sinfo", "sinfoc", "sinfon", "sinfop", "sinfov", "spartab", "specinfo", "tinfo",
        "vardes", "vct", "vct2", "verifygrid", "vlist", "xinfon", "zaxisdes",
    ];

    /// Operators writing exactly two output files
    pub const TWO_OUTPUT: &[&str] = &[
        "trend", "samplegridicon", "mrotuv", "eoftime", "eofspatial", "eof3dtime",
        "eof3dspatial", "eof3d", "eof", "complextorect", "complextopol",
    ];

    /// Operators writing an input-dependent number of files under a prefix
    pub const VARIABLE_OUTPUT: &[&str] = &[
        "distgrid", "eofcoeff", "eofcoeff3d", "intyear", "scatter", "splitcode", "splitday",
        "splitgrid", "splithour", "splitlevel", "splitmon", "splitname", "splitparam",
        "splitrec", "splitseas", "splitsel", "splittabnum", "splitvar", "splityear",
        "splityearmon", "splitzaxis",
    ];

    /// Operators missing from single-line help output (before 1.5.6)
    pub const UNDOCUMENTED: &[&str] = &[
        "anomaly", "beta", "boxavg", "change_e5lsm", "change_e5mask", "change_e5slm",
        "chisquare", "chvar", "cloudlayer", "cmd", "com", "command", "complextorect",
        "covar0", "covar0r", "daycount", "daylogs", "del29feb", "delday", "delete", "deltap",
        "deltap_fl", "delvar", "diffv", "divcoslat", "dumplogo", "dumplogs", "duplicate",
        "eca_r1mm", "enlargegrid", "ensrkhistspace", "ensrkhisttime", "eof3d",
        "eof3dspatial", "eof3dtime", "export_e5ml", "export_e5res", "fc2gp", "fc2sp",
        "fillmiss", "fisher", "fldcovar", "fldrms", "fourier", "fpressure", "gather",
        "gengrid", "geopotheight", "ggstat", "ggstats", "globavg", "gp2fc", "gradsdes",
        "gridverify", "harmonic", "hourcount", "hpressure", "ifs2icon", "import_e5ml",
        "import_e5res", "import_obs", "imtocomplex", "infos", "infov", "interpolate",
        "intgrid", "intgridbil", "intgridtraj", "intpoint", "isosurface", "lmavg", "lmean",
        "lmmean", "lmstd", "log", "lsmean", "meandiff2test", "mergegrid", "mod", "moncount",
        "monlogs", "mrotuv", "mrotuvb", "mulcoslat", "ncode", "ncopy", "nmltest", "normal",
        "nvar", "outputbounds", "outputboundscpt", "outputcenter", "outputcenter2",
        "outputcentercpt", "outputkey", "outputtri", "outputvector", "outputvrml", "pardup",
        "parmul", "pinfo", "pinfov", "pressure_fl", "pressure_hl", "read_e5ml", "remapcon1",
        "remapdis1", "retocomplex", "scalllogo", "scatter", "seascount", "select",
        "selgridname", "seloperator", "selvar", "selzaxisname", "setrcaname", "setvar",
        "showvar", "sinfov", "smemlogo", "snamelogo", "sort", "sortcode", "sortlevel",
        "sortname", "sorttaxis", "sorttimestamp", "sortvar", "sp2fc", "specinfo", "spectrum",
        "sperclogo", "splitvar", "stimelogo", "studentt", "template1", "template2", "test",
        "test2", "testdata", "thinout", "timcount", "timcovar", "tinfo", "transxy", "trms",
        "tstepcount", "vardes", "vardup", "varmul", "varquot2test", "varrms", "vertwind",
        "write_e5ml", "writegrid", "writerandom", "yearcount",
    ];
}
