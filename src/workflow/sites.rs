//! 目标站点的页面选择器
//!
//! 站点改版时只需要改这里

/// 需要逐个点击截图的标签页
#[derive(Debug, Clone, Copy)]
pub struct TabTarget {
    pub label: &'static str,
    pub selector: &'static str,
    /// 截图文件名（不含前缀和扩展名）
    pub file_stem: &'static str,
}

/// 一组标签页及其所在区块
#[derive(Debug, Clone, Copy)]
pub struct TabGroup {
    pub name: &'static str,
    /// 区块不存在或不可见时整组跳过
    pub section: &'static str,
    pub tabs: &'static [TabTarget],
}

// --- 股票报告页 ---
pub const REPORT_SEARCH_INPUT: &str = "input.report_search_input";
pub const REPORT_FIRST_SUGGESTION: &str = "a.autosug_list_item";
pub const REPORT_PDF_FRAME: &str = "iframe";

// --- 股票概览页 ---
pub const OVERVIEW_SEARCH_INPUT: &str = "#search_str";
pub const OVERVIEW_FIRST_SUGGESTION: &str = ".suglist.scrollBar a";

pub const FINANCIAL_TABS: &[TabTarget] = &[
    TabTarget {
        label: "Net Profit",
        selector: r##"a[href="#C-12-ov-net-profit"]"##,
        file_stem: "financials_netprofit",
    },
    TabTarget {
        label: "Debt to Equity",
        selector: r##"a[href="#C-12-ov-debt-to-equity"]"##,
        file_stem: "financials_debttoequity",
    },
    TabTarget {
        label: "Quarterly Results",
        selector: "label#quarc span.radio_button_text",
        file_stem: "financials_quarterly",
    },
    TabTarget {
        label: "Quarterly Net Profit",
        selector: r##"a[href="#C-3-ov-net-profit"]"##,
        file_stem: "financials_qnetprofit",
    },
];

pub const SHAREHOLDING_TABS: &[TabTarget] = &[
    TabTarget {
        label: "FII",
        selector: "a#fii_tb",
        file_stem: "shareholding_fii",
    },
    TabTarget {
        label: "DII",
        selector: "a#dii_tb",
        file_stem: "shareholding_dii",
    },
    TabTarget {
        label: "Public",
        selector: "a#public_tb",
        file_stem: "shareholding_public",
    },
    TabTarget {
        label: "Others",
        selector: "a#others_tb",
        file_stem: "shareholding_others",
    },
];

pub const TAB_GROUPS: &[TabGroup] = &[
    TabGroup {
        name: "财务数据",
        section: "div#financials.clearfix",
        tabs: FINANCIAL_TABS,
    },
    TabGroup {
        name: "股权结构",
        section: "div#sharepattern",
        tabs: SHAREHOLDING_TABS,
    },
];

/// 图表页地址
pub fn chart_url(base: &str, stock_name: &str) -> String {
    format!("{}?symbol={}", base, urlencoding::encode(stock_name))
}
