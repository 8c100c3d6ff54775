//! Front-end page
//! GET / — 撮影 → 解析 → ビルドカード、Discover タブ

use axum::response::Html;

/// GET / — シングルページのUI
pub async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>BrickVision</title>
<style>
*{margin:0;padding:0;box-sizing:border-box}
body{background:#f4f4f4;color:#222;font-family:-apple-system,sans-serif;padding:24px}
nav{display:flex;justify-content:space-between;align-items:center;border-bottom:6px solid #C91A09;padding-bottom:16px;margin-bottom:24px}
h1{color:#0055BF;font-size:28px}
.btn{background:#FFD500;color:#000;border:3px solid #0055BF;border-radius:12px;
  padding:12px 24px;font-size:16px;font-weight:800;cursor:pointer}
.btn.blue{background:#0055BF;color:#fff}
.btn.red{background:#C91A09;color:#fff}
.btn:disabled{opacity:.5}
.grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(260px,1fr));gap:20px;margin-top:20px}
.card{background:#fff;border:4px solid #0055BF;border-radius:20px;overflow:hidden}
.card header{background:#0055BF;color:#fff;padding:16px;display:flex;justify-content:space-between;font-size:32px}
.card header small{font-size:11px;font-weight:800;text-transform:uppercase}
.card .body{padding:16px}
.card h3{color:#0055BF;margin-bottom:8px}
.card img{width:100%;aspect-ratio:16/9;object-fit:cover;border-radius:12px;margin-top:12px}
.chips span{display:inline-block;background:#fff;border:1px solid #ddd;border-radius:6px;padding:2px 6px;margin:2px;font-size:12px}
#preview{max-width:280px;border-radius:12px;border:4px solid #0055BF;display:none;margin:12px 0}
#status{margin:12px 0;font-weight:700}
.error{color:#C91A09}
.empty{background:#fff;border:4px dashed #ccc;border-radius:24px;padding:48px;text-align:center}
.tabs{display:flex;gap:8px;flex-wrap:wrap;margin:12px 0}
.tabs .active{background:#C91A09;color:#fff}
input[type=text]{width:100%;padding:14px;font-size:18px;border:4px solid #0055BF;border-radius:16px}
input[type=file]{display:none}
.hidden{display:none}
.sources a{font-size:11px;margin-right:6px}
</style>
</head>
<body>
<nav>
  <h1>BrickVision</h1>
  <div>
    <button class="btn blue" onclick="show('scan')">Scan</button>
    <button class="btn" onclick="show('discover')">Discover</button>
  </div>
</nav>

<section id="scan">
  <button class="btn red" onclick="document.getElementById('fileInput').click()">Snap a Photo ✨</button>
  <input type="file" id="fileInput" accept="image/*" capture="environment">
  <img id="preview">
  <div id="status"></div>
  <div id="results"></div>
</section>

<section id="discover" class="hidden">
  <input type="text" id="search" placeholder="Quick search...">
  <div class="tabs" id="tabs"></div>
  <div class="grid" id="catalog"></div>
  <div style="text-align:center;margin-top:24px">
    <button class="btn hidden" id="more">Browse More Treasures ➔</button>
  </div>
</section>

<script>
const $=(id)=>document.getElementById(id);
const esc=(s)=>String(s??'').replace(/[&<>"']/g,c=>({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
function show(view){
  $('scan').classList.toggle('hidden',view!=='scan');
  $('discover').classList.toggle('hidden',view!=='discover');
  if(view==='discover'&&!$('catalog').children.length)loadDiscover(true);
}

// ---- Scan ----
let analysisId=null;
$('fileInput').addEventListener('change',async(e)=>{
  const file=e.target.files[0];
  if(!file)return;
  const reader=new FileReader();
  reader.onload=(ev)=>{$('preview').src=ev.target.result;$('preview').style.display='block';};
  reader.readAsDataURL(file);
  const form=new FormData();
  form.append('image',file);
  await runAnalysis(fetch('/api/analyze',{method:'POST',body:form}));
  e.target.value='';
});

async function runAnalysis(request){
  $('status').className='';
  $('status').textContent='Sorting possibilities...';
  $('results').innerHTML='';
  try{
    const res=await request;
    const data=await res.json();
    if(!res.ok)throw new Error(data.error||'Failed to analyze bricks.');
    analysisId=data.analysisId;
    $('status').textContent='';
    renderResults(data);
  }catch(err){
    $('status').className='error';
    $('status').textContent=err.message;
  }
}

function renderResults(data){
  const r=data.result;
  if(data.noBricksFound){
    $('results').innerHTML=`<div class="empty"><h2>Zero Bricks Detected</h2>
      <p>We couldn't find any identifiable pieces. Try better lighting on a solid background!</p></div>`;
    return;
  }
  const chips=r.identifiedBricks.map(b=>`<span>${esc(b)}</span>`).join('');
  const cards=r.suggestions.map((b,i)=>`<div class="card">
      <header>${esc(b.icon)}<small>${esc(b.difficulty)}</small></header>
      <div class="body"><h3>${esc(b.title)}</h3><p>${esc(b.description)}</p>
      <p><b>~${b.estimatedPieces} bricks</b></p>
      <button class="btn" onclick="toggleBuild(${i})">View Instructions ➔</button>
      <div id="build-${i}" class="hidden"><ol>${b.steps.map(s=>`<li>${esc(s)}</li>`).join('')}</ol>
      <div id="img-${i}">Designing with your specific bricks...</div></div></div></div>`).join('');
  $('results').innerHTML=`<div class="chips">${chips}</div>
    <button class="btn red" onclick="regenerate()">Regenerate Ideas ✨</button>
    <div class="grid">${cards}</div>`;
}

function regenerate(){
  if(analysisId)runAnalysis(fetch(`/api/analyses/${analysisId}/regenerate`,{method:'POST'}));
}

async function toggleBuild(i){
  const panel=$('build-'+i);
  panel.classList.toggle('hidden');
  if(panel.classList.contains('hidden'))return;
  const url=`/api/analyses/${analysisId}/builds/${i}/illustration`;
  for(let tries=0;tries<60;tries++){
    const res=await fetch(url,{method:'POST'});
    const data=await res.json();
    if(res.status===202){await new Promise(r=>setTimeout(r,2000));continue;}
    if(res.ok&&data.imageUrl){$('img-'+i).innerHTML=`<img src="${data.imageUrl}">`;}
    else{console.error('Failed to generate build image',data.error);}
    return;
  }
}

// ---- Discover ----
const TABS=[['sets','🏰 Sets'],['pieces','🧩 Parts'],['minifigures','👤 Minifigs'],['themes','🎨 Themes']];
let topic='sets',page=1,timer=null;
$('tabs').innerHTML=TABS.map(([id,label])=>`<button class="btn" data-topic="${id}">${label}</button>`).join('');
$('tabs').querySelectorAll('button').forEach(btn=>{
  btn.onmouseenter=()=>fetch(`/api/discover/prefetch?topic=${btn.dataset.topic}`,{method:'POST'});
  btn.onclick=()=>{topic=btn.dataset.topic;$('search').value='';loadDiscover(true);};
});
$('search').addEventListener('input',()=>{clearTimeout(timer);timer=setTimeout(()=>loadDiscover(true),400);});
$('more').onclick=()=>loadDiscover(false);

async function loadDiscover(reset){
  if(reset){page=1;$('catalog').innerHTML='';}
  $('tabs').querySelectorAll('button').forEach(b=>b.classList.toggle('active',b.dataset.topic===topic));
  $('more').disabled=true;
  const q=encodeURIComponent($('search').value);
  try{
    const res=await fetch(`/api/discover?topic=${topic}&q=${q}&page=${page}`);
    const data=await res.json();
    if(!res.ok)throw new Error(data.error);
    $('catalog').insertAdjacentHTML('beforeend',data.items.map(item=>`<div class="card">
      <img src="${esc(item.imageUrl)}" loading="lazy" onerror="this.src='https://placehold.co/600x400/FFD500/0055BF?text='+encodeURIComponent(this.alt)" alt="${esc(item.title)}">
      <div class="body"><small>${esc(item.rarity)} · #${esc(item.id)}</small>
      <h3>${esc(item.title)}</h3><p>${esc(item.description)}</p>
      <p>${esc(item.marketPrice||'N/A')} · ${item.pieceCount||0}P</p>
      <div class="sources">${item.sourceUrls.map(s=>`<a href="${esc(s.uri)}" target="_blank" rel="noopener noreferrer">🔗 ${esc(s.title.split(' ')[0])}</a>`).join('')}</div>
      </div></div>`).join(''));
    $('more').classList.toggle('hidden',!data.hasNextPage);
    if(data.nextPage)page=data.nextPage;
  }catch(err){
    $('catalog').insertAdjacentHTML('beforeend',`<p class="error">${esc(err.message)}</p>`);
  }
  $('more').disabled=false;
}
</script>
</body>
</html>"#;
