/// The set of symbols a run iterates over.
#[derive(Debug, Clone)]
pub enum Universe {
    Custom(Vec<String>),
    /// Cross-sector speculative low-priced names.
    PennyStocks,
    /// Liquid large caps.
    LargeCaps,
}

impl Universe {
    pub fn symbols(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Universe::Custom(symbols) => return dedup(symbols.clone()),
            Universe::PennyStocks => vec![
                // Technology
                "SIRI", "NOK", "GPRO", "BB", "SSYS", "IQ", "RAD", "PLTR", "SOFI", "CLSK",
                // Healthcare
                "ACRX", "SRNE", "NVAX", "MNKD", "PGNX", "CTXR", "SESN", "ATOS", "SNDL", "VXRT",
                // Energy
                "FCEL", "PLUG", "UUUU", "CPE", "SHIP", "BORR", "TELL", "WWR", "RIG", "NOG",
                // Retail
                "EXPR", "GME", "AMC", "BBBY", "WISH", "KOSS", "NAKD", "SFIX", "POSH", "REAL",
                // Mining
                "BTG", "NAK", "GPL", "EGO", "HL", "SVM", "MUX", "AG", "PAAS", "MAG",
                // Biotech
                "OCGN", "INO", "BCRX", "BNGO", "AMRN", "TTOO", "CODX", "ADMA", "IBIO", "OGEN",
                // Finance
                "FAMI", "METX", "BK", "IVR", "TWO", "XSPA", "CLOV", "UWMC", "GSAT", "MNMD",
                // Other
                "IDEX", "MARA", "RIOT", "SOS", "ZOM", "GEVO", "SENS", "TRCH", "CIDM", "MVIS",
            ],
            Universe::LargeCaps => vec![
                "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "TSLA", "META", "BRK.B", "V", "JPM",
                "WMT", "MA", "PG", "HD", "DIS", "NFLX", "ADBE", "CRM", "CSCO", "INTC", "AMD",
                "PYPL", "COST", "PEP", "TMO", "MRK", "ABBV", "NKE", "CVX", "MCD",
            ],
        };
        dedup(raw.iter().map(|s| s.to_string()).collect())
    }
}

fn dedup(symbols: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    symbols
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
