//! Embedded self-contained report document
//!
//! Used when no template file is configured. Carries its own styles and the
//! client-side search/filter script; the dynamic regions start out empty.

pub const SKELETON: &str = r#"<!DOCTYPE html>
<html lang="ja">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Microsoft 365 ライセンス利用状況レポート</title>
    <style>
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Hiragino Sans', 'Meiryo',
        sans-serif;
    line-height: 1.6;
    color: #1f2937;
    background: #f9fafb;
}

.container {
    max-width: 1400px;
    margin: 0 auto;
    padding: 2rem;
}

header {
    margin-bottom: 2rem;
    padding-bottom: 1rem;
    border-bottom: 2px solid #e5e7eb;
}

header h1 {
    font-size: 1.75rem;
    color: #0f3d7a;
}

.report-timestamp {
    color: #6b7280;
    font-size: 0.875rem;
}

.summary-grid {
    display: grid;
    grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
    gap: 1rem;
    margin-bottom: 2rem;
}

.summary-card {
    background: #ffffff;
    padding: 1.25rem;
    border-radius: 0.5rem;
    box-shadow: 0 1px 3px rgba(0, 0, 0, 0.1);
}

.card-label {
    font-size: 0.75rem;
    font-weight: 600;
    color: #6b7280;
}

.card-value {
    font-size: 1.75rem;
    font-weight: 700;
}

.card-note {
    font-size: 0.75rem;
    color: #6b7280;
}

.plan-card .card-value {
    font-size: 1.25rem;
}

.efficiency-high .card-value { color: #16a34a; }
.efficiency-medium .card-value { color: #ca8a04; }
.efficiency-low .card-value { color: #dc2626; }

.filters {
    display: flex;
    gap: 1rem;
    margin-bottom: 1rem;
    flex-wrap: wrap;
    align-items: flex-end;
}

.filter-group {
    display: flex;
    flex-direction: column;
    gap: 0.25rem;
}

.filter-group label {
    font-size: 0.75rem;
    font-weight: 600;
    color: #6b7280;
}

.filter-group select,
.filter-group input {
    padding: 0.5rem;
    border: 1px solid #d1d5db;
    border-radius: 0.375rem;
    font-size: 0.875rem;
    min-width: 240px;
}

#user-count, .filter-status {
    font-size: 0.875rem;
    color: #374151;
}

table {
    width: 100%;
    border-collapse: collapse;
    background: #ffffff;
    border-radius: 0.5rem;
    overflow: hidden;
    box-shadow: 0 1px 3px rgba(0, 0, 0, 0.1);
}

th {
    background: #f3f4f6;
    padding: 0.75rem;
    text-align: left;
    font-size: 0.75rem;
    font-weight: 600;
    border-bottom: 2px solid #e5e7eb;
}

td {
    padding: 0.75rem;
    border-bottom: 1px solid #e5e7eb;
    font-size: 0.875rem;
}

td.cost {
    text-align: right;
    font-variant-numeric: tabular-nums;
}

tr.attention { background: #fff7ed; }
tr.info { background: #eff6ff; }
tbody tr:hover { background: #f3f4f6; }

footer {
    margin-top: 3rem;
    padding-top: 1rem;
    border-top: 1px solid #e5e7eb;
    text-align: center;
    color: #6b7280;
    font-size: 0.875rem;
}

@media (max-width: 768px) {
    .container { padding: 1rem; }
    .summary-grid { grid-template-columns: 1fr; }
    th, td { padding: 0.5rem; }
}
    </style>
</head>
<body>
    <div class="container">
        <header>
            <h1>Microsoft 365 ライセンス利用状況レポート</h1>
            <p class="report-timestamp"></p>
        </header>

        <div class="summary-grid"></div>

        <section class="users">
            <div class="filters">
                <div class="filter-group">
                    <label for="search-input">検索 (ユーザー名・部署・ライセンス)</label>
                    <input type="text" id="search-input" placeholder="キーワードを入力">
                </div>
                <div class="filter-group">
                    <label for="license-filter">ライセンス種別</label>
                    <select id="license-filter"></select>
                </div>
                <p class="filter-status">表示中: <span id="visible-count">0</span>件</p>
            </div>
            <p id="user-count"></p>
            <table id="user-table">
                <thead>
                    <tr>
                        <th>No</th>
                        <th>ユーザー名</th>
                        <th>部署コード</th>
                        <th>ライセンス種別</th>
                        <th>月額コスト</th>
                        <th>利用状況</th>
                        <th>最適化状況</th>
                    </tr>
                </thead>
                <tbody id="user-table-body"></tbody>
            </table>
        </section>

        <footer class="report-footer"></footer>
    </div>
    <script>
(function () {
    var search = document.getElementById('search-input');
    var filter = document.getElementById('license-filter');
    var visible = document.getElementById('visible-count');
    var rows = document.querySelectorAll('#user-table-body tr');

    function cellText(row, index) {
        var cells = row.getElementsByTagName('td');
        return cells[index] ? cells[index].textContent.toLowerCase() : '';
    }

    function applyFilters() {
        var term = search.value.trim().toLowerCase();
        var license = filter.value.toLowerCase();
        var shown = 0;

        rows.forEach(function (row) {
            var name = cellText(row, 1);
            var department = cellText(row, 2);
            var licenseType = cellText(row, 3);
            var termMatch = !term ||
                name.indexOf(term) !== -1 ||
                department.indexOf(term) !== -1 ||
                licenseType.indexOf(term) !== -1;
            var licenseMatch = !license || licenseType.indexOf(license) !== -1;
            var show = termMatch && licenseMatch;
            row.style.display = show ? '' : 'none';
            if (show) {
                shown += 1;
            }
        });

        visible.textContent = shown;
    }

    search.addEventListener('input', applyFilters);
    filter.addEventListener('change', applyFilters);
    applyFilters();
})();
    </script>
</body>
</html>
"#;
