use serde::Serialize;

/// Maximum number of symbols returned by one lookup
pub const MAX_LOOKUP_RESULTS: usize = 5;

/// A listed company and the words that identify it in headlines.
#[derive(Debug, Clone, Copy)]
pub struct TickerKeywords {
    pub symbol: &'static str,
    pub name: &'static str,
    /// Lowercase; matched as substrings
    pub keywords: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerMatch {
    pub symbol: String,
    pub name: String,
    pub keyword: String,
}

pub static TICKER_KEYWORDS: &[TickerKeywords] = &[
    TickerKeywords { symbol: "AAPL", name: "Apple Inc.", keywords: &["apple", "iphone", "ipad", "macbook", "tim cook", "苹果"] },
    TickerKeywords { symbol: "MSFT", name: "Microsoft Corporation", keywords: &["microsoft", "windows", "azure", "xbox", "微软"] },
    TickerKeywords { symbol: "GOOGL", name: "Alphabet Inc.", keywords: &["google", "alphabet", "youtube", "android", "谷歌"] },
    TickerKeywords { symbol: "AMZN", name: "Amazon.com, Inc.", keywords: &["amazon", "aws", "prime video", "亚马逊"] },
    TickerKeywords { symbol: "META", name: "Meta Platforms, Inc.", keywords: &["meta platforms", "facebook", "instagram", "whatsapp", "zuckerberg"] },
    TickerKeywords { symbol: "TSLA", name: "Tesla, Inc.", keywords: &["tesla", "elon musk", "cybertruck", "特斯拉"] },
    TickerKeywords { symbol: "NVDA", name: "NVIDIA Corporation", keywords: &["nvidia", "geforce", "jensen huang", "英伟达"] },
    TickerKeywords { symbol: "AMD", name: "Advanced Micro Devices, Inc.", keywords: &["advanced micro devices", "radeon", "ryzen"] },
    TickerKeywords { symbol: "INTC", name: "Intel Corporation", keywords: &["intel", "英特尔"] },
    TickerKeywords { symbol: "TSM", name: "Taiwan Semiconductor Manufacturing", keywords: &["tsmc", "taiwan semiconductor", "台积电"] },
    TickerKeywords { symbol: "NFLX", name: "Netflix, Inc.", keywords: &["netflix", "奈飞"] },
    TickerKeywords { symbol: "JPM", name: "JPMorgan Chase & Co.", keywords: &["jpmorgan", "jp morgan", "jamie dimon", "摩根大通"] },
    TickerKeywords { symbol: "GS", name: "The Goldman Sachs Group, Inc.", keywords: &["goldman sachs", "高盛"] },
    TickerKeywords { symbol: "BRK.B", name: "Berkshire Hathaway Inc.", keywords: &["berkshire", "warren buffett", "伯克希尔"] },
    TickerKeywords { symbol: "XOM", name: "Exxon Mobil Corporation", keywords: &["exxon", "埃克森美孚"] },
    TickerKeywords { symbol: "BA", name: "The Boeing Company", keywords: &["boeing", "波音"] },
    TickerKeywords { symbol: "DIS", name: "The Walt Disney Company", keywords: &["disney", "迪士尼"] },
    TickerKeywords { symbol: "BABA", name: "Alibaba Group Holding Limited", keywords: &["alibaba", "taobao", "阿里巴巴"] },
    TickerKeywords { symbol: "BIDU", name: "Baidu, Inc.", keywords: &["baidu", "百度"] },
    TickerKeywords { symbol: "0700.HK", name: "Tencent Holdings Limited", keywords: &["tencent", "wechat", "腾讯", "微信"] },
    TickerKeywords { symbol: "1211.HK", name: "BYD Company Limited", keywords: &["byd", "比亚迪"] },
    TickerKeywords { symbol: "7203.T", name: "Toyota Motor Corporation", keywords: &["toyota", "丰田", "トヨタ"] },
    TickerKeywords { symbol: "005930.KS", name: "Samsung Electronics Co., Ltd.", keywords: &["samsung", "三星"] },
    TickerKeywords { symbol: "ASML", name: "ASML Holding N.V.", keywords: &["asml"] },
    TickerKeywords { symbol: "BTC-USD", name: "Bitcoin", keywords: &["bitcoin", "比特币"] },
    TickerKeywords { symbol: "ETH-USD", name: "Ethereum", keywords: &["ethereum", "以太坊"] },
];

/// Companies mentioned in `text`, in table order, at most [`MAX_LOOKUP_RESULTS`].
///
/// For each entry only the first matching keyword is reported.
pub fn lookup_tickers(text: &str) -> Vec<TickerMatch> {
    lookup_in(TICKER_KEYWORDS, text)
}

fn lookup_in(table: &[TickerKeywords], text: &str) -> Vec<TickerMatch> {
    let haystack = text.to_lowercase();
    if haystack.trim().is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<TickerMatch> = Vec::new();
    for entry in table {
        if matches.len() >= MAX_LOOKUP_RESULTS {
            break;
        }
        if matches.iter().any(|m| m.symbol == entry.symbol) {
            continue;
        }
        if let Some(keyword) = entry.keywords.iter().find(|k| haystack.contains(*k)) {
            matches.push(TickerMatch {
                symbol: entry.symbol.to_string(),
                name: entry.name.to_string(),
                keyword: keyword.to_string(),
            });
        }
    }
    matches
}
